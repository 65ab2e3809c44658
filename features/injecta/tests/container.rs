use std::{
    sync::atomic::{AtomicUsize, Ordering},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::executor::block_on;
use injecta::{
    BuildContext, Container, Dependencies, DependencyGraphError, DynError, Invoke, LifecycleError,
    Logger, NoopLogger, Provide, ProvideError, ProvidedKey, ResolveError, StartError, StopError,
    LIFECYCLE,
};

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn container() -> Container {
    Container::builder().logging(false).build()
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

/// A provider building its name, recording its build and both hooks into `log`
fn tracked(name: &'static str, dependencies: &[&'static str], log: &Log) -> Provide<String> {
    let log = log.clone();
    let mut provide = Provide::new(move |ctx: BuildContext| {
        let log = log.clone();
        async move {
            push(&log, format!("build {name}"));
            let lifecycle = ctx.lifecycle("lifecycle")?;

            let start_log = log.clone();
            lifecycle.on_start(move || {
                let log = start_log.clone();
                async move {
                    push(&log, format!("start {name}"));
                    Ok::<_, DynError>(())
                }
            });

            let stop_log = log.clone();
            lifecycle.on_stop(move || {
                let log = stop_log.clone();
                async move {
                    push(&log, format!("stop {name}"));
                    Ok::<_, DynError>(())
                }
            });

            Ok::<_, DynError>(name.to_string())
        }
    })
    .depends_on("lifecycle", &LIFECYCLE);

    for dependency in dependencies {
        provide = provide.depends_on(*dependency, *dependency);
    }
    provide
}

/// A provider counting its builds
fn counted(builds: &Arc<AtomicUsize>, dependencies: &[&'static str]) -> Provide<usize> {
    let builds = builds.clone();
    let mut provide = Provide::new(move |_: BuildContext| {
        let builds = builds.clone();
        async move { Ok::<_, DynError>(builds.fetch_add(1, Ordering::SeqCst)) }
    });
    for dependency in dependencies {
        provide = provide.depends_on(*dependency, *dependency);
    }
    provide
}

fn noop_invocation(dependencies: &[&'static str]) -> Invoke {
    let mut invoke = Invoke::new(|_: Dependencies| async { Ok::<_, DynError>(()) });
    for dependency in dependencies {
        invoke = invoke.depends_on(*dependency, *dependency);
    }
    invoke
}

#[test]
fn build_runs_once_for_two_dependents() {
    let container = container();
    let shared_builds = counter();
    let dependent_builds = counter();

    container.provide("shared", counted(&shared_builds, &[])).unwrap();
    container.provide("a", counted(&dependent_builds, &["shared"])).unwrap();
    container.provide("b", counted(&dependent_builds, &["shared"])).unwrap();
    container.invoke(noop_invocation(&["a", "b"]));

    block_on(container.start()).unwrap();
    block_on(container.resolve_named::<usize>("shared")).unwrap();

    assert_eq!(shared_builds.load(Ordering::SeqCst), 1);
    assert_eq!(dependent_builds.load(Ordering::SeqCst), 2);
}

#[test]
fn diamond_dependents_observe_the_same_instance() {
    let container = container();
    let c = container
        .provide("c", Provide::new(|_: BuildContext| async { Ok::<_, DynError>(vec![1, 2, 3]) }))
        .unwrap();

    let seen: Arc<Mutex<Vec<Arc<Vec<i32>>>>> = Arc::new(Mutex::new(Vec::new()));
    for name in ["a", "b"] {
        let seen = seen.clone();
        let key = c.clone();
        container
            .provide(
                name,
                Provide::new(move |ctx: BuildContext| {
                    let seen = seen.clone();
                    let key = key.clone();
                    async move {
                        seen.lock().unwrap().push(ctx.of(&key)?);
                        Ok::<_, DynError>(())
                    }
                })
                .depends_on("c", &c),
            )
            .unwrap();
    }
    container.invoke(noop_invocation(&["a", "b"]));

    block_on(container.start()).unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(Arc::ptr_eq(&seen[0], &seen[1]));
}

#[test]
fn hooks_follow_dependency_order() {
    let container = container();
    let log = log();

    // app -> server -> db, app -> db
    let app = container.provide("app", tracked("app", &["server", "db"], &log)).unwrap();
    container.provide("server", tracked("server", &["db"], &log)).unwrap();
    container.provide("db", tracked("db", &[], &log)).unwrap();
    block_on(container.resolve(&app)).unwrap();

    let invoke_log = log.clone();
    container.invoke(
        Invoke::new(move |deps: Dependencies| async move {
            push(&invoke_log, format!("invoke {}", deps.get::<String>("app")?));
            Ok::<_, DynError>(())
        })
        .depends_on("app", "app"),
    );

    block_on(container.start()).unwrap();
    block_on(container.stop()).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "build db",
            "build server",
            "build app",
            "start db",
            "start server",
            "start app",
            "invoke app",
            "stop app",
            "stop server",
            "stop db",
        ]
    );
}

#[test]
fn services_without_lifecycle_are_skipped() {
    let container = container();
    let log = log();
    let builds = counter();

    container.provide("plain", counted(&builds, &[])).unwrap();
    container.provide("tracked", tracked("tracked", &["plain"], &log)).unwrap();
    block_on(container.resolve_named::<String>("tracked")).unwrap();

    block_on(container.start()).unwrap();
    block_on(container.stop()).unwrap();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(
        entries(&log),
        vec!["build tracked", "start tracked", "stop tracked"]
    );
}

#[test]
fn services_built_by_invocations_start_on_the_next_start() {
    let container = container();
    let log = log();
    container.provide("db", tracked("db", &[], &log)).unwrap();
    container.invoke(noop_invocation(&["db"]));

    block_on(container.start()).unwrap();
    assert_eq!(entries(&log), vec!["build db"]);

    block_on(container.start_lifecycle_hooks()).unwrap();
    block_on(container.stop()).unwrap();
    assert_eq!(entries(&log), vec!["build db", "start db", "stop db"]);
}

#[test]
fn each_invocation_resolves_right_before_its_callback() {
    let container = container();
    let log = log();

    let build_log = log.clone();
    container
        .provide(
            "x",
            Provide::new(move |_: BuildContext| {
                let log = build_log.clone();
                async move {
                    push(&log, "build x");
                    Ok::<_, DynError>(())
                }
            }),
        )
        .unwrap();

    let first = log.clone();
    container.invoke(Invoke::new(move |_: Dependencies| async move {
        push(&first, "first");
        Ok::<_, DynError>(())
    }));
    let second = log.clone();
    container.invoke(
        Invoke::new(move |_: Dependencies| async move {
            push(&second, "second");
            Ok::<_, DynError>(())
        })
        .depends_on("x", "x"),
    );

    block_on(container.start()).unwrap();

    assert_eq!(entries(&log), vec!["first", "build x", "second"]);
}

#[test]
fn missing_provider_only_aborts_later_invocations() {
    let container = container();
    let ran = log();

    let first = ran.clone();
    container.invoke(Invoke::new(move |_: Dependencies| async move {
        push(&first, "first");
        Ok::<_, DynError>(())
    }));
    let second = ran.clone();
    container.invoke(
        Invoke::new(move |_: Dependencies| async move {
            push(&second, "second");
            Ok::<_, DynError>(())
        })
        .depends_on("y", "Y"),
    );

    let err = block_on(container.start()).unwrap_err();

    assert_eq!(err.to_string(), "No provider found for 'Y'");
    assert_eq!(entries(&ran), vec!["first"]);
}

#[test]
fn cycle_fails_start_before_anything_runs() {
    let container = container();
    let builds = counter();

    container.provide("a", counted(&builds, &["b"])).unwrap();
    container.provide("b", counted(&builds, &["a"])).unwrap();
    let invoked = counter();
    let invoked_clone = invoked.clone();
    container.invoke(
        Invoke::new(move |_: Dependencies| async move {
            invoked_clone.fetch_add(1, Ordering::SeqCst);
            Ok::<_, DynError>(())
        })
        .depends_on("a", "a"),
    );

    let err = block_on(container.start()).unwrap_err();

    match err {
        StartError::DependencyGraph(DependencyGraphError::CircularDependency { name, .. }) => {
            assert!(name == "a" || name == "b", "unexpected cycle node {name}");
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn direct_resolution_detects_cycles() {
    let container = container();
    let builds = counter();
    container.provide("a", counted(&builds, &["b"])).unwrap();
    container.provide("b", counted(&builds, &["a"])).unwrap();

    let err = block_on(container.resolve_named::<usize>("a")).unwrap_err();

    match err {
        ResolveError::CircularDependency { name, chain } => {
            assert_eq!(name, "a");
            assert_eq!(chain, vec!["a", "b", "a"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    // The failed attempt leaves nothing in progress
    container.provide("b", counted(&builds, &[])).unwrap();
    assert_eq!(block_on(container.resolve_named::<usize>("a")).unwrap(), Arc::new(1));
}

#[test]
fn missing_provider_names_the_missing_dependency() {
    let container = container();
    container
        .provide("X", Provide::value(1_u8).depends_on("y", "Y"))
        .unwrap();
    container.invoke(noop_invocation(&["X"]));

    let err = block_on(container.start()).unwrap_err();

    match err {
        StartError::Resolve(ResolveError::MissingProvider { name, required_by }) => {
            assert_eq!(name, "Y");
            assert_eq!(required_by.as_deref(), Some("X"));
        }
        other => panic!("expected a missing provider, got {other:?}"),
    }
}

#[test]
fn missing_provider_message() {
    let err = ResolveError::MissingProvider {
        name: "Y".to_string(),
        required_by: Some("X".to_string()),
    };

    assert_eq!(err.to_string(), "No provider found for 'Y' (required by 'X')");
}

#[test]
fn database_and_server_start_and_stop_in_order() {
    let container = container();
    let calls = log();

    #[derive(Clone)]
    struct Database(Log);
    #[derive(Clone)]
    struct Server(Log);

    let db_calls = calls.clone();
    let db = container
        .provide(
            "db",
            Provide::new(move |ctx: BuildContext| {
                let database = Database(db_calls.clone());
                async move {
                    let closing = database.clone();
                    ctx.lifecycle("lifecycle")?.on_stop(move || {
                        let database = closing.clone();
                        async move {
                            push(&database.0, "close");
                            Ok::<_, DynError>(())
                        }
                    });
                    Ok::<_, DynError>(database)
                }
            })
            .depends_on("lifecycle", &LIFECYCLE),
        )
        .unwrap();

    let server_calls = calls.clone();
    let server: ProvidedKey<Server> = container
        .provide(
            "server",
            Provide::new(move |ctx: BuildContext| {
                let server = Server(server_calls.clone());
                async move {
                    let database = ctx.get::<Database>("db")?;
                    push(&database.0, "connect");

                    let stopping = server.clone();
                    ctx.lifecycle("lifecycle")?.on_stop(move || {
                        let server = stopping.clone();
                        async move {
                            push(&server.0, "stop");
                            Ok::<_, DynError>(())
                        }
                    });
                    Ok::<_, DynError>(server)
                }
            })
            .depends_on("db", &db)
            .depends_on("lifecycle", &LIFECYCLE),
        )
        .unwrap();

    container.invoke(
        Invoke::new(|deps: Dependencies| async move {
            let server = deps.get::<Server>("server")?;
            push(&server.0, "start");
            Ok::<_, DynError>(())
        })
        .depends_on("server", &server),
    );

    block_on(container.start()).unwrap();
    block_on(container.stop()).unwrap();

    assert_eq!(entries(&calls), vec!["connect", "start", "stop", "close"]);
}

#[test]
fn separate_containers_do_not_share_instances() {
    let builds = counter();

    for _ in 0..2 {
        let container = container();
        container.provide("service", counted(&builds, &[])).unwrap();
        container.invoke(noop_invocation(&["service"]));
        block_on(container.start()).unwrap();

        assert!(container.is_resolved("service"));
    }

    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn failing_invocation_aborts_the_rest() {
    let container = container();
    let ran = log();

    let first = ran.clone();
    container.invoke(Invoke::new(move |_: Dependencies| async move {
        push(&first, "first");
        Ok::<_, DynError>(())
    }));
    container.invoke(
        Invoke::new(|_: Dependencies| async { Err::<(), _>("server refused to start") })
            .named("start server"),
    );
    let third = ran.clone();
    container.invoke(Invoke::new(move |_: Dependencies| async move {
        push(&third, "third");
        Ok::<_, DynError>(())
    }));

    let err = block_on(container.start()).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Invocation 'start server' failed: server refused to start"
    );
    assert_eq!(entries(&ran), vec!["first"]);
}

#[test]
fn failing_build_keeps_the_provider_name() {
    let container = container();
    container
        .provide(
            "broken",
            Provide::new(|_: BuildContext| async { Err::<u8, _>("no connection") }),
        )
        .unwrap();
    container.provide("dependent", Provide::value(1_u8).depends_on("b", "broken")).unwrap();
    container.invoke(noop_invocation(&["dependent"]));

    let err = block_on(container.start()).unwrap_err();

    match err {
        StartError::Resolve(ResolveError::BuildFailed { name, source }) => {
            assert_eq!(name, "broken");
            assert_eq!(source.to_string(), "no connection");
        }
        other => panic!("expected a build failure, got {other:?}"),
    }
    assert!(!container.is_resolved("broken"));
    assert!(!container.is_resolved("dependent"));
}

#[test]
fn failing_stop_hook_is_reported() {
    let container = container();
    container
        .provide(
            "db",
            Provide::new(|ctx: BuildContext| async move {
                ctx.lifecycle("lifecycle")?
                    .on_stop(|| async { Err::<(), _>("still busy") });
                Ok::<_, DynError>(())
            })
            .depends_on("lifecycle", &LIFECYCLE),
        )
        .unwrap();
    container.invoke(noop_invocation(&["db"]));

    block_on(container.start()).unwrap();
    let err = block_on(container.stop()).unwrap_err();

    assert_eq!(err.to_string(), "OnStop hook of 'db' failed: still busy");
    assert!(matches!(err, StopError::Lifecycle(LifecycleError::HookFailed { .. })));
}

#[test]
fn providers_can_be_replaced_until_resolved() {
    let container = container();
    container.provide("value", Provide::value(1_u8)).unwrap();
    container.provide("value", Provide::value(2_u8)).unwrap();

    assert_eq!(*block_on(container.resolve_named::<u8>("value")).unwrap(), 2);
    assert_eq!(
        container.provide("value", Provide::value(3_u8)).unwrap_err(),
        ProvideError::AlreadyResolved("value".to_string())
    );
    assert_eq!(*block_on(container.resolve_named::<u8>("value")).unwrap(), 2);
}

#[test]
fn invocations_run_once() {
    let container = container();
    let runs = counter();
    let runs_clone = runs.clone();
    container.invoke(Invoke::new(move |_: Dependencies| async move {
        runs_clone.fetch_add(1, Ordering::SeqCst);
        Ok::<_, DynError>(())
    }));

    block_on(container.start()).unwrap();
    block_on(container.start()).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn invocations_cannot_request_a_lifecycle() {
    let container = container();
    container.invoke(
        Invoke::new(|_: Dependencies| async { Ok::<_, DynError>(()) })
            .depends_on("lifecycle", &LIFECYCLE),
    );

    let err = block_on(container.start()).unwrap_err();

    assert!(matches!(
        err,
        StartError::Resolve(ResolveError::MissingProvider { ref name, .. }) if name == "lifecycle"
    ));
}

#[test]
fn typed_keys_resolve_their_type() {
    let container = container();
    let greeting = container.provide("greeting", Provide::value("hello".to_string())).unwrap();
    let anonymous = container
        .provide_anonymous(
            Provide::new(|ctx: BuildContext| async move {
                let greeting = ctx.get::<String>("greeting")?;
                Ok::<_, DynError>(greeting.len())
            })
            .depends_on("greeting", &greeting),
        )
        .unwrap();

    assert_eq!(*block_on(container.resolve(&anonymous)).unwrap(), 5);
    assert!(anonymous.name().starts_with("anonymous-"));
    assert_eq!(
        container.dependencies_of(anonymous.name()),
        Some(vec!["greeting".to_string()])
    );

    let wrong = ProvidedKey::<u32>::named("greeting");
    assert!(matches!(
        block_on(container.resolve(&wrong)),
        Err(ResolveError::DowncastFailed { .. })
    ));
}

#[test]
fn mismatched_type_is_rejected_before_building() {
    let container = container();
    let builds = counter();
    container.provide("count", counted(&builds, &[])).unwrap();

    let err = block_on(container.resolve_named::<String>("count")).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Failed to downcast 'count', required: 'alloc::string::String' actual: 'usize'"
    );
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert!(container.provided_type("count").unwrap().is::<usize>());
    assert!(container.provided_type("missing").is_none());
}

#[test]
fn validate_reports_all_graph_issues() {
    let container = container();
    container.provide("a", Provide::value(1_u8).depends_on("b", "b")).unwrap();
    container.provide("b", Provide::value(1_u8).depends_on("a", "a")).unwrap();
    container.provide("c", Provide::value(1_u8).depends_on("missing", "missing")).unwrap();

    let errors = container.validate().unwrap_err();

    assert_eq!(errors.errors.len(), 2);
    let message = errors.to_string();
    assert!(message.starts_with("The dependency graph had one or more errors:"));
    assert!(message.contains("- 'c' needs 'missing' but it is missing"));
}

struct RecordingLogger(Log);
impl Logger for RecordingLogger {
    fn provide(&self, name: &str, dependencies: &[String]) {
        push(&self.0, format!("provide {name} [{}]", dependencies.join(",")));
    }
    fn invoke(&self, dependencies: &[String]) {
        push(&self.0, format!("invoke [{}]", dependencies.join(",")));
    }
    fn before_build(&self, name: &str) {
        push(&self.0, format!("before build {name}"));
    }
    fn built(&self, name: &str, _elapsed: Duration) {
        push(&self.0, format!("built {name}"));
    }
    fn hook_on_start(&self, name: &str) {
        push(&self.0, format!("on start {name}"));
    }
    fn hook_on_start_complete(&self, name: &str, _elapsed: Duration) {
        push(&self.0, format!("on start complete {name}"));
    }
    fn hook_on_stop(&self, name: &str) {
        push(&self.0, format!("on stop {name}"));
    }
    fn hook_on_stop_complete(&self, name: &str, _elapsed: Duration) {
        push(&self.0, format!("on stop complete {name}"));
    }
    fn running(&self) {
        push(&self.0, "running");
    }
}

#[test]
fn logger_observes_every_step() {
    let events = log();
    let container = Container::builder()
        .logger(RecordingLogger(events.clone()))
        .build();
    let service_log = log();

    container.provide("db", tracked("db", &[], &service_log)).unwrap();
    container.invoke(noop_invocation(&["db"]));
    block_on(container.resolve_named::<String>("db")).unwrap();
    block_on(container.start()).unwrap();
    block_on(container.stop()).unwrap();

    assert_eq!(
        entries(&events),
        vec![
            "provide db [lifecycle]",
            "invoke [db]",
            "before build db",
            "built db",
            "on start db",
            "on start complete db",
            "running",
            "on stop db",
            "on stop complete db",
        ]
    );
}

#[test]
fn logger_can_be_replaced_and_disabled() {
    let events = log();
    let container = Container::builder()
        .logging(false)
        .logger(RecordingLogger(events.clone()))
        .build();
    container.provide("a", Provide::value(1_u8)).unwrap();
    assert!(entries(&events).is_empty());

    container.set_logger(RecordingLogger(events.clone()));
    container.provide("b", Provide::value(1_u8)).unwrap();
    assert_eq!(entries(&events), vec!["provide b []"]);

    container.set_logger(NoopLogger);
    container.provide("c", Provide::value(1_u8)).unwrap();
    assert_eq!(entries(&events).len(), 1);
}
