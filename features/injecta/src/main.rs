use std::{
    error::Error,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
};

use injecta::{BuildContext, Container, Dependencies, DynError, Invoke, Provide, LIFECYCLE};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let container = Container::new();

    let db = container.provide(
        "db",
        Provide::new(|ctx: BuildContext| async move {
            let db = Database::default();
            let closing = db.clone();
            ctx.lifecycle("lifecycle")?.on_stop(move || {
                let db = closing.clone();
                async move { db.close() }
            });
            Ok::<_, DynError>(db)
        })
        .depends_on("lifecycle", &LIFECYCLE),
    )?;

    let server = container.provide(
        "server",
        Provide::new(|ctx: BuildContext| async move {
            let db = ctx.get::<Database>("db")?;
            db.connect()?;

            let server = Server::default();
            let stopping = server.clone();
            ctx.lifecycle("lifecycle")?.on_stop(move || {
                let server = stopping.clone();
                async move { server.stop() }
            });
            Ok::<_, DynError>(server)
        })
        .depends_on("db", &db)
        .depends_on("lifecycle", &LIFECYCLE),
    )?;

    container.invoke(
        Invoke::new(|deps: Dependencies| async move { deps.get::<Server>("server")?.start() })
            .named("start server")
            .depends_on("server", &server),
    );

    futures::executor::block_on(async {
        container.start().await?;
        container.stop().await?;
        Ok::<_, Box<dyn Error>>(())
    })
}

#[derive(Debug, Clone, Default)]
struct Database {
    connected: Arc<AtomicBool>,
}
impl Database {
    fn connect(&self) -> Result<(), DynError> {
        tracing::info!("Database connected");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), DynError> {
        tracing::info!("Database closed");
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct Server {
    running: Arc<AtomicBool>,
}
impl Server {
    fn start(&self) -> Result<(), DynError> {
        tracing::info!("Server started");
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), DynError> {
        tracing::info!("Server stopped");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
