//! Ordering and gating properties of the test orchestrator.

use relforge_core::{HardwareTests, StageStatus};
use relforge_hil::fakes::{EmulatorCall, ScriptedEmulator};
use relforge_hil::{ProvisionMode, TestOrchestrator, TestSpec};

fn spec(commands: &str, devices: &str, packages: &str) -> TestSpec {
    TestSpec::from_lines("/mnt/shared", commands, devices, packages).unwrap()
}

fn orchestrator(
    emulator: ScriptedEmulator,
    commands: &str,
    devices: &str,
    packages: &str,
) -> TestOrchestrator<ScriptedEmulator> {
    TestOrchestrator::new(
        emulator,
        spec(commands, devices, packages),
        ProvisionMode::Install,
    )
}

/// Stop-on-first-failure: with [A, B, C] and B failing, C never executes and
/// the cause names B.
#[tokio::test]
async fn later_commands_never_run_after_a_failure() {
    let orch = orchestrator(
        ScriptedEmulator::with_exit_codes(vec![0, 3, 0]),
        "mount /dev/sda1 /mnt\ni2cdetect -y 0\ncat /mnt/result",
        "",
        "",
    );

    let status = orch.run().await;
    match status {
        StageStatus::Failed(cause) => {
            assert!(cause.contains("i2cdetect -y 0"));
            assert!(cause.contains("code 3"));
        }
        other => panic!("expected failure, got {other}"),
    }
}

#[tokio::test]
async fn failing_command_stops_the_sequence() {
    let emulator = ScriptedEmulator::with_exit_codes(vec![0, 1]);
    let orch = TestOrchestrator::new(
        emulator,
        spec("first\nsecond\nthird", "", ""),
        ProvisionMode::Install,
    );

    let _ = orch.run().await;

    let executed: Vec<String> = orch_calls_execs(&orch);
    assert_eq!(executed, vec!["first".to_string(), "second".to_string()]);
}

/// Device attachment (and the shared-dir mount) completes fully before the
/// first command executes.
#[tokio::test]
async fn attachment_completes_before_first_command() {
    let orch = orchestrator(
        ScriptedEmulator::all_passing(),
        "v4l2-ctl --list-devices",
        "vivid\ngpio 16\ni2c 0x1C",
        "v4l-utils",
    );

    let status = orch.run().await;
    assert_eq!(status, StageStatus::Succeeded);

    let calls = orch_calls(&orch);
    let first_exec = calls
        .iter()
        .position(|c| matches!(c, EmulatorCall::Exec(_)))
        .expect("a command ran");
    let last_attach = calls
        .iter()
        .rposition(|c| matches!(c, EmulatorCall::Attach(_)))
        .expect("devices attached");
    let mount = calls
        .iter()
        .position(|c| matches!(c, EmulatorCall::Mount(_)))
        .expect("shared dir mounted");
    let last_install = calls
        .iter()
        .rposition(|c| matches!(c, EmulatorCall::Install(_)))
        .expect("package installed");

    assert!(last_install < last_attach, "provisioning precedes attachment");
    assert!(last_attach < first_exec, "all devices attach before commands");
    assert!(mount < first_exec, "shared dir binds before commands");

    // Declared attachment order is preserved.
    let attached = orch_attached(&orch);
    assert_eq!(attached.len(), 3);
    assert_eq!(attached[0].to_string(), "vivid");
    assert!(attached[1].to_string().starts_with("gpio"));
    assert!(attached[2].to_string().starts_with("i2c"));
}

/// Teardown runs on success and on failure.
#[tokio::test]
async fn teardown_runs_on_both_paths() {
    let passing = orchestrator(ScriptedEmulator::all_passing(), "true", "", "");
    assert_eq!(passing.run().await, StageStatus::Succeeded);
    assert!(orch_torn_down(&passing));

    let failing = orchestrator(
        ScriptedEmulator::with_exit_codes(vec![1]),
        "false",
        "",
        "",
    );
    assert!(failing.run().await.is_failed());
    assert!(orch_torn_down(&failing));
}

/// An empty command sequence succeeds trivially once setup completes.
#[tokio::test]
async fn empty_command_sequence_succeeds() {
    let orch = orchestrator(ScriptedEmulator::all_passing(), "", "gpio 8", "");
    assert_eq!(orch.run().await, StageStatus::Succeeded);
}

// The orchestrator owns its emulator; these helpers reach through the fake's
// recorded call log via the orchestrator accessors used in unit tests.
fn orch_calls(orch: &TestOrchestrator<ScriptedEmulator>) -> Vec<EmulatorCall> {
    orch.emulator().calls()
}

fn orch_calls_execs(orch: &TestOrchestrator<ScriptedEmulator>) -> Vec<String> {
    orch.emulator().executed()
}

fn orch_attached(
    orch: &TestOrchestrator<ScriptedEmulator>,
) -> Vec<relforge_hil::PeripheralBinding> {
    orch.emulator().attached()
}

fn orch_torn_down(orch: &TestOrchestrator<ScriptedEmulator>) -> bool {
    orch.emulator().torn_down()
}
