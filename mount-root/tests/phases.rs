//! Phase behavior against an in-memory volume library.
//!
//! Covers:
//! - overlay volume resolution (hint, default, absent)
//! - start strategies per filesystem condition
//! - done finalize, including the start → done handover for unready volumes
//! - guards and failure propagation into the exit code

use std::path::Path;

use fstools_test_utils::{late_env, preinit_env, shutdown_env, Call, FakeVolumes, Op};
use mount_root::finalize::FinalizeAction;
use mount_root::phase::Guard;
use mount_root::resolve::resolve_volume;
use mount_root::strategy::{MountStrategy, RamReason};
use mount_root::{
    run_phase, BootEnv, BootPhase, ExtrootOutcome, Filesystem, FilesystemCondition,
    MountRootConfig, OverlayState, PhaseOutcome, Transition,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

const BOOT_CMDLINE: &str = "console=ttyS0,115200 rootwait";

fn config() -> MountRootConfig {
    MountRootConfig::default()
}

fn start_strategy(outcome: &PhaseOutcome) -> MountStrategy {
    match outcome {
        PhaseOutcome::Completed(Transition::Start(t)) => t.strategy,
        other => panic!("expected completed start, got {:?}", other),
    }
}

fn done_action(outcome: &PhaseOutcome) -> FinalizeAction {
    match outcome {
        PhaseOutcome::Completed(Transition::Done(t)) => t.action,
        other => panic!("expected completed done, got {:?}", other),
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[test]
fn hint_wins_over_default_volume() {
    let lib = FakeVolumes::new()
        .with_volume("mmcblk0p3", FilesystemCondition::Ext4)
        .with_volume("rootfs_data", FilesystemCondition::Jffs2);

    let volume = resolve_volume(&lib, Some("mmcblk0p3"), "rootfs_data").unwrap();
    assert_eq!(volume.name(), "mmcblk0p3");
}

#[test]
fn dev_prefixed_hint_resolves_like_bare_name() {
    let mut lib = FakeVolumes::new()
        .with_volume("mmcblk0p3", FilesystemCondition::Ext4)
        .with_volume("rootfs_data", FilesystemCondition::Jffs2);

    let bare = run_phase(
        BootPhase::Start,
        &preinit_env("overlay=mmcblk0p3"),
        &config(),
        &mut lib,
    );
    let bare_calls = lib.side_effects();
    lib.clear_calls();

    let prefixed = run_phase(
        BootPhase::Start,
        &preinit_env("console=ttyS0 overlay=/dev/mmcblk0p3 quiet"),
        &config(),
        &mut lib,
    );

    assert_eq!(bare.exit_code(), 0);
    assert_eq!(prefixed.exit_code(), 0);
    assert_eq!(bare_calls, lib.side_effects());
    assert_eq!(
        lib.side_effects(),
        vec![Call::MountOverlay("mmcblk0p3".into(), Filesystem::Ext4)]
    );
}

#[test]
fn missing_hinted_volume_falls_back_to_default() {
    let lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Ubifs);

    let volume = resolve_volume(&lib, Some("sdb1"), "rootfs_data").unwrap();
    assert_eq!(volume.name(), "rootfs_data");
    assert_eq!(
        lib.calls(),
        vec![Call::Find("sdb1".into()), Call::Find("rootfs_data".into())]
    );
}

#[test]
fn nothing_resolves_without_volumes() {
    let lib = FakeVolumes::new();
    assert!(resolve_volume(&lib, None, "rootfs_data").is_none());
    assert!(resolve_volume(&lib, Some("sda1"), "rootfs_data").is_none());
}

// ============================================================================
// START
// ============================================================================

#[test]
fn start_without_volume_mounts_root_and_tries_extroot() {
    let mut lib = FakeVolumes::new();
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), 0);
    assert_eq!(start_strategy(&report.outcome), MountStrategy::RootInPlace);
    assert_eq!(
        lib.side_effects(),
        vec![Call::MountRootInPlace, Call::MountExtroot]
    );
}

#[test]
fn start_without_volume_reports_extroot_switch() {
    let mut lib = FakeVolumes::new().with_extroot(ExtrootOutcome::Switched);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    match report.outcome {
        PhaseOutcome::Completed(Transition::Start(t)) => {
            assert_eq!(t.extroot, Some(ExtrootOutcome::Switched));
            assert_eq!(t.volume, None);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn start_extroot_error_still_succeeds() {
    let mut lib = FakeVolumes::new().failing(Op::MountExtroot);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn start_root_remount_failure_fails_phase() {
    let mut lib = FakeVolumes::new().failing(Op::MountRootInPlace);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert_eq!(lib.side_effects(), vec![Call::MountRootInPlace]);
}

#[test]
fn start_mounts_persistent_filesystems_directly() {
    for (condition, filesystem) in [
        (FilesystemCondition::Jffs2, Filesystem::Jffs2),
        (FilesystemCondition::Ubifs, Filesystem::Ubifs),
        (FilesystemCondition::Ext4, Filesystem::Ext4),
    ] {
        let mut lib = FakeVolumes::new().with_volume("rootfs_data", condition);
        let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            lib.side_effects(),
            vec![Call::MountOverlay("rootfs_data".into(), filesystem)]
        );
    }
}

#[test]
fn start_uses_snapshot_procedure() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Snapshot);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(start_strategy(&report.outcome), MountStrategy::Snapshot);
    assert_eq!(
        lib.side_effects(),
        vec![Call::MountSnapshot("rootfs_data".into())]
    );
}

#[test]
fn start_without_filesystem_uses_ram_overlay() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::None);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(
        start_strategy(&report.outcome),
        MountStrategy::RamOverlay(RamReason::NoFilesystem)
    );
    assert_eq!(lib.side_effects(), vec![Call::MountRamOverlay]);
}

#[test]
fn start_unclassifiable_volume_uses_ram_overlay() {
    let mut lib = FakeVolumes::new()
        .with_volume("rootfs_data", FilesystemCondition::Ext4)
        .failing(Op::Classify);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        start_strategy(&report.outcome),
        MountStrategy::RamOverlay(RamReason::Unclassified)
    );
}

#[test]
fn start_overlay_mount_failure_fails_phase() {
    let mut lib = FakeVolumes::new()
        .with_volume("rootfs_data", FilesystemCondition::Jffs2)
        .failing(Op::MountOverlay);
    let report = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert!(matches!(report.outcome, PhaseOutcome::Failed(_)));
}

#[test]
fn start_unreadable_cmdline_uses_default_volume() {
    let mut lib = FakeVolumes::new()
        .with_volume("mmcblk0p3", FilesystemCondition::Ext4)
        .with_volume("rootfs_data", FilesystemCondition::Jffs2);
    let env = BootEnv {
        preinit: true,
        cmdline: None,
        ..Default::default()
    };

    let report = run_phase(BootPhase::Start, &env, &config(), &mut lib);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        lib.side_effects(),
        vec![Call::MountOverlay("rootfs_data".into(), Filesystem::Jffs2)]
    );
}

// ============================================================================
// START → DONE HANDOVER
// ============================================================================

#[test]
fn deadcode_volume_gets_ram_overlay_then_conversion() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Deadcode);
    let overlay = config().overlay_dir;

    let start = run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);
    assert_eq!(start.exit_code(), 0);
    assert_eq!(
        start_strategy(&start.outcome),
        MountStrategy::RamOverlay(RamReason::NotReady)
    );
    assert_eq!(lib.side_effects(), vec![Call::MountRamOverlay]);
    assert_eq!(start.state_written(), None);
    assert_eq!(lib.state(&overlay), None);

    lib.clear_calls();
    let done = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(done.exit_code(), 0);
    assert_eq!(done_action(&done.outcome), FinalizeAction::Convert);
    assert_eq!(
        lib.side_effects(),
        vec![Call::ConvertInPlace("rootfs_data".into())]
    );
    assert_eq!(lib.state(&overlay), None);
}

#[test]
fn done_reresolves_instead_of_reusing_start() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Deadcode);
    run_phase(BootPhase::Start, &preinit_env(BOOT_CMDLINE), &config(), &mut lib);

    // Volume became usable between the phases
    lib.set_condition("rootfs_data", FilesystemCondition::Jffs2);
    lib.clear_calls();

    let done = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);
    assert_eq!(done_action(&done.outcome), FinalizeAction::MarkReady);
    assert_eq!(
        lib.calls(),
        vec![
            Call::Find("rootfs_data".into()),
            Call::Classify("rootfs_data".into()),
            Call::SetState(Path::new("/overlay").to_path_buf(), OverlayState::Ready),
        ]
    );
}

// ============================================================================
// DONE
// ============================================================================

#[test]
fn done_marks_persistent_overlay_ready() {
    let mut lib = FakeVolumes::new().with_volume("mmcblk0p3", FilesystemCondition::Ext4);
    let report = run_phase(
        BootPhase::Done,
        &late_env("overlay=/dev/mmcblk0p3"),
        &config(),
        &mut lib,
    );

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.state_written(), Some(OverlayState::Ready));
    assert_eq!(lib.state(Path::new("/overlay")), Some(OverlayState::Ready));
}

#[test]
fn done_without_volume_fails() {
    let mut lib = FakeVolumes::new();
    let report = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert!(lib.side_effects().is_empty());
}

#[test]
fn done_leaves_snapshot_alone() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Snapshot);
    let report = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), 0);
    assert_eq!(done_action(&report.outcome), FinalizeAction::Skip);
    assert!(lib.side_effects().is_empty());
}

#[test]
fn done_never_converts_on_failed_probe() {
    let mut lib = FakeVolumes::new()
        .with_volume("rootfs_data", FilesystemCondition::Deadcode)
        .failing(Op::Classify);
    let report = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert!(lib.side_effects().is_empty());
}

#[test]
fn done_conversion_failure_fails_phase() {
    let mut lib = FakeVolumes::new()
        .with_volume("rootfs_data", FilesystemCondition::None)
        .failing(Op::ConvertInPlace);
    let report = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);
    assert_eq!(report.exit_code(), -1);
}

#[test]
fn done_state_write_failure_fails_phase() {
    let mut lib = FakeVolumes::new()
        .with_volume("rootfs_data", FilesystemCondition::Ubifs)
        .failing(Op::SetState);
    let report = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert_eq!(report.state_written(), None);
}

#[test]
fn done_uses_configured_default_volume() {
    let mut lib = FakeVolumes::new().with_volume("data", FilesystemCondition::Ext4);
    let config = MountRootConfig {
        default_volume: "data".into(),
        ..Default::default()
    };
    let report = run_phase(BootPhase::Done, &late_env(BOOT_CMDLINE), &config, &mut lib);
    assert_eq!(report.exit_code(), 0);
}

// ============================================================================
// RAM / STOP / GUARDS
// ============================================================================

#[test]
fn ram_skips_resolution() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Ext4);
    let report = run_phase(BootPhase::Ram, &BootEnv::default(), &config(), &mut lib);

    assert_eq!(report.exit_code(), 0);
    assert_eq!(lib.calls(), vec![Call::MountRamOverlay]);
}

#[test]
fn stop_without_shutdown_fails_without_side_effects() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Ext4);
    let report = run_phase(BootPhase::Stop, &BootEnv::default(), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert!(matches!(
        report.outcome,
        PhaseOutcome::Refused(Guard::NotShuttingDown)
    ));
    assert!(lib.calls().is_empty());
}

#[test]
fn stop_during_shutdown_does_nothing() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Ext4);
    let report = run_phase(BootPhase::Stop, &shutdown_env(), &config(), &mut lib);

    assert_eq!(report.exit_code(), 0);
    assert!(lib.calls().is_empty());
}

#[test]
fn start_outside_preinit_is_refused() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Ext4);
    let report = run_phase(BootPhase::Start, &late_env(BOOT_CMDLINE), &config(), &mut lib);

    assert_eq!(report.exit_code(), -1);
    assert!(matches!(
        report.outcome,
        PhaseOutcome::Refused(Guard::NotPreinit)
    ));
    assert!(lib.calls().is_empty());
}

#[test]
fn start_with_marker_runs_outside_preinit() {
    let mut lib = FakeVolumes::new().with_volume("rootfs_data", FilesystemCondition::Ext4);
    let env = BootEnv {
        preinit_marker: true,
        cmdline: Some(BOOT_CMDLINE.into()),
        ..Default::default()
    };
    let report = run_phase(BootPhase::Start, &env, &config(), &mut lib);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn unknown_phase_is_rejected_before_any_phase_runs() {
    assert!(BootPhase::from_arg(Some("foo")).is_err());
}
