//! End-to-end tests for the automatic answering hooks.
//! These wire a registry, a mode and mock collaborators together the way a
//! transport would, without spawning any sub-process.

use autoauth_core::test_support::{MockConnection, MockSource, RecordingHandler};
use autoauth_core::{
    AutoAuthMode, CredentialRecord, CredentialSpec, PatternCredentialTable, PromptClassifier,
    PromptDispatcher, PromptKind, PromptOutcome, PromptRegistry, Secret,
};
use std::sync::Arc;

struct Harness {
    registry: PromptRegistry,
    mode: AutoAuthMode,
    default_secret: Arc<RecordingHandler>,
    default_confirm: Arc<RecordingHandler>,
    source: Arc<MockSource>,
}

fn funny_machines() -> CredentialSpec {
    CredentialSpec::new()
        .with("host", "Funny-Machines")
        .with("user", "root")
        .with("port", "ssh")
}

fn harness(table: PatternCredentialTable, source: MockSource) -> Harness {
    let default_secret = RecordingHandler::unanswered();
    let default_confirm = RecordingHandler::unanswered();
    let registry = PromptRegistry::new(default_secret.clone(), default_confirm.clone());
    let source = Arc::new(source);
    let mode = AutoAuthMode::new(table.into_shared(), source.clone());
    Harness {
        registry,
        mode,
        default_secret,
        default_confirm,
        source,
    }
}

fn scenario_table() -> PatternCredentialTable {
    let mut table = PatternCredentialTable::new();
    table.push(r"root@10\.0\.", funny_machines()).unwrap();
    table
}

#[test]
fn test_secret_prompt_answered_for_matching_path() {
    let mut h = harness(scenario_table(), MockSource::with_secret("$r00tP#sWD!"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["ssh", "root@10.0.5.3:ssh-session"]);
    let outcome = h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(outcome, PromptOutcome::Answered);
    assert_eq!(conn.written(), "$r00tP#sWD!\n");
    assert_eq!(conn.write_count(), 1);
    assert_eq!(h.default_secret.calls(), 0);
    assert_eq!(h.source.queries(), vec![funny_machines()]);
}

#[test]
fn test_secret_prompt_unmatched_path_falls_through() {
    let mut h = harness(scenario_table(), MockSource::with_secret("$r00tP#sWD!"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["admin@192.168.1.1"]);
    let outcome = h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(outcome, PromptOutcome::Unanswered);
    assert_eq!(conn.written(), "");
    assert_eq!(h.default_secret.calls(), 1);
    assert_eq!(h.default_secret.paths(), ["admin@192.168.1.1"]);
    assert_eq!(h.source.search_count(), 0);
}

#[test]
fn test_secret_resolution_failure_calls_default_once() {
    let mut h = harness(scenario_table(), MockSource::failing());
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]);
    h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(h.default_secret.calls(), 1);
    assert_eq!(conn.write_count(), 0);
}

#[test]
fn test_record_without_secret_calls_default_once() {
    let source = MockSource::with_records(|| vec![CredentialRecord::default()]);
    let mut h = harness(scenario_table(), source);
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]);
    h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(h.default_secret.calls(), 1);
    assert_eq!(conn.write_count(), 0);
}

#[test]
fn test_deferred_secret_is_forced() {
    let source = MockSource::with_records(|| {
        vec![CredentialRecord::with_secret(Secret::deferred(|| {
            Ok("abc".to_string())
        }))]
    });
    let mut h = harness(scenario_table(), source);
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]).with_terminator("\r\n");
    h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(conn.written(), "abc\r\n");
    assert_eq!(h.default_secret.calls(), 0);
}

#[test]
fn test_failed_secret_write_is_not_retried_by_default() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]).failing_writes();
    let outcome = h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(outcome, PromptOutcome::Unanswered);
    assert_eq!(conn.attempt_count(), 1);
    assert_eq!(h.default_secret.calls(), 0);
}

#[test]
fn test_failed_confirmation_write_is_not_retried_by_default() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]).failing_writes();
    let outcome = h.registry.dispatch(PromptKind::Confirmation, &mut conn);

    assert_eq!(outcome, PromptOutcome::Unanswered);
    assert_eq!(conn.attempt_count(), 1);
    assert_eq!(h.default_confirm.calls(), 0);
}

#[test]
fn test_confirmation_ignores_spec_content() {
    let mut table = PatternCredentialTable::new();
    table
        .push("host-b", CredentialSpec::new().with("", "%%not a real query%%"))
        .unwrap();
    let mut h = harness(table, MockSource::failing());
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["deploy@host-b.internal"]);
    let outcome = h.registry.dispatch(PromptKind::Confirmation, &mut conn);

    assert_eq!(outcome, PromptOutcome::Answered);
    assert_eq!(conn.written(), "yes\n");
    assert_eq!(h.default_confirm.calls(), 0);
    assert_eq!(h.source.search_count(), 0);
}

#[test]
fn test_confirmation_unmatched_falls_through() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["admin@192.168.1.1"]);
    h.registry.dispatch(PromptKind::Confirmation, &mut conn);

    assert_eq!(conn.written(), "");
    assert_eq!(h.default_confirm.calls(), 1);
}

#[test]
fn test_missing_path_behaves_as_empty_string() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&[]);
    h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(h.default_secret.paths(), [""]);
    assert_eq!(conn.write_count(), 0);
}

#[test]
fn test_double_enable_answers_once() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]);
    h.registry.dispatch(PromptKind::Secret, &mut conn);

    assert_eq!(conn.written(), "pw\n");
    assert_eq!(h.source.search_count(), 1);
}

#[test]
fn test_disable_restores_default_behaviour() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);
    h.mode.enable(&mut h.registry);
    h.mode.disable(&mut h.registry);

    let mut conn = MockConnection::new(&["root@10.0.5.3"]);
    h.registry.dispatch(PromptKind::Secret, &mut conn);
    h.registry.dispatch(PromptKind::Confirmation, &mut conn);

    assert_eq!(conn.write_count(), 0);
    assert_eq!(h.default_secret.calls(), 1);
    assert_eq!(h.default_confirm.calls(), 1);
}

#[test]
fn test_disable_before_enable_is_noop() {
    let mut h = harness(scenario_table(), MockSource::with_secret("pw"));
    h.mode.disable(&mut h.registry);
    assert!(!h.mode.is_enabled());
    assert_eq!(h.registry.layer_count(PromptKind::Secret), 0);
}

#[test]
fn test_table_updates_are_seen_while_enabled() {
    let mut h = harness(PatternCredentialTable::new(), MockSource::with_secret("pw"));
    h.mode.enable(&mut h.registry);

    let mut conn = MockConnection::new(&["late@host"]);
    h.registry.dispatch(PromptKind::Secret, &mut conn);
    assert_eq!(conn.write_count(), 0);

    h.mode
        .table()
        .write()
        .unwrap()
        .push("late@", CredentialSpec::new())
        .unwrap();

    h.registry.dispatch(PromptKind::Secret, &mut conn);
    assert_eq!(conn.written(), "pw\n");
}

#[test]
fn test_dispatcher_drives_full_ssh_exchange() {
    let mut table = scenario_table();
    table.push("host-b", CredentialSpec::new()).unwrap();
    let mut h = harness(table, MockSource::with_secret("$r00tP#sWD!"));
    h.mode.enable(&mut h.registry);

    let classifier = PromptClassifier::with_patterns(
        autoauth_core::DEFAULT_SECRET_PROMPT,
        autoauth_core::DEFAULT_CONFIRMATION_PROMPT,
    )
    .unwrap();
    let mut dispatcher = PromptDispatcher::new(classifier);
    let mut conn = MockConnection::new(&["ssh", "root@10.0.5.3"]);

    let host_key = "The authenticity of host '10.0.5.3' can't be established.\n\
        Are you sure you want to continue connecting (yes/no/[fingerprint])? ";
    assert_eq!(
        dispatcher.feed(&h.registry, &mut conn, host_key),
        Some(PromptOutcome::Answered)
    );
    assert_eq!(
        dispatcher.feed(&h.registry, &mut conn, "root@10.0.5.3's password: "),
        Some(PromptOutcome::Answered)
    );
    assert_eq!(dispatcher.feed(&h.registry, &mut conn, "\nWelcome\n$ "), None);

    assert_eq!(conn.written(), "yes\n$r00tP#sWD!\n");
}
