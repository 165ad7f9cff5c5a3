use storage_contracts::{ConfirmResult, ConfirmTone};
use storage_testing::fixtures::GIB;
use storage_testing::{DeviceCall, ServiceCall, SnapshotBuilder, TestRig};

fn service_rig(snapshot: SnapshotBuilder, services: &[(&str, bool)]) -> TestRig {
    let rig = TestRig::with_snapshot(snapshot);
    for (name, running) in services {
        rig.services.add_service(name, *running);
    }
    rig
}

fn mounted_primary() -> SnapshotBuilder {
    SnapshotBuilder::new().nas_disk("sdb", 4 * GIB, Some("/mnt/nas"))
}

#[tokio::test]
async fn declining_service_stop_keeps_everything_running() {
    let rig = service_rig(mounted_primary(), &[("smbd", true), ("jellyfin", true)]);

    let result = rig.operations.unmount("sdb").await.unwrap();
    assert!(result.is_declined());
    assert!(rig.devices.calls().is_empty());
    assert!(rig.services.is_running("smbd"));
    assert!(rig.services.is_running("jellyfin"));
    assert!(
        !rig.services
            .calls()
            .iter()
            .any(|call| matches!(call, ServiceCall::Stop { .. }))
    );
    assert_eq!(rig.prompt.titles(), vec!["Stop dependent services"]);
}

#[tokio::test]
async fn stopped_services_allow_unmount_without_second_prompt() {
    let rig = service_rig(mounted_primary(), &[("smbd", true), ("jellyfin", true)]);
    rig.prompt.push_yes(1);

    rig.operations.unmount("sdb").await.unwrap();
    assert_eq!(
        rig.services.calls()[1],
        ServiceCall::Stop {
            names: vec!["smbd".to_string(), "jellyfin".to_string()]
        }
    );
    assert_eq!(
        rig.devices.calls(),
        vec![DeviceCall::Unmount {
            device: "sdb".to_string(),
            mount_point: "/mnt/nas".to_string(),
        }]
    );
    assert_eq!(rig.prompt.requests().len(), 1);
    assert!(rig.session.is_pending());
}

#[tokio::test]
async fn refused_stop_asks_before_forcing() {
    let rig = service_rig(mounted_primary(), &[("smbd", true), ("jellyfin", true)]);
    rig.services.refuse_stop("jellyfin", "transcode in progress");
    rig.prompt.push_yes(1);

    let result = rig.operations.unmount("sdb").await.unwrap();
    assert!(result.is_declined());
    assert!(rig.devices.calls().is_empty());
    assert!(!rig.services.is_running("smbd"));
    assert_eq!(
        rig.notifier.warnings(),
        vec!["jellyfin did not stop: transcode in progress"]
    );

    let force = &rig.prompt.requests()[1];
    assert_eq!(force.title, "Force unmount");
    assert_eq!(force.tone, ConfirmTone::HighRisk);
}

#[tokio::test]
async fn forced_unmount_proceeds_after_second_confirmation() {
    let rig = service_rig(mounted_primary(), &[("smbd", true), ("jellyfin", true)]);
    rig.services.refuse_stop("jellyfin", "transcode in progress");
    rig.prompt.push_yes(2);

    let result = rig.operations.unmount("sdb").await.unwrap();
    assert!(result.is_done());
    assert_eq!(rig.devices.mutating_calls().len(), 1);
    assert!(rig.services.is_running("jellyfin"));
}

#[tokio::test]
async fn idle_services_still_need_plain_confirmation() {
    let rig = service_rig(mounted_primary(), &[("smbd", false)]);

    let result = rig.operations.unmount("sdb").await.unwrap();
    assert!(result.is_declined());
    assert_eq!(rig.prompt.titles(), vec!["Unmount"]);
    assert!(rig.devices.calls().is_empty());
}

#[tokio::test]
async fn secondary_destination_skips_service_checks() {
    let rig = service_rig(
        SnapshotBuilder::new().nas_disk("sdc", 4 * GIB, Some("/mnt/nas_backup")),
        &[("smbd", true)],
    );
    rig.prompt.push(ConfirmResult::yes());

    rig.operations.unmount("sdc").await.unwrap();
    assert!(rig.services.calls().is_empty());
    assert_eq!(rig.prompt.titles(), vec!["Unmount"]);
    assert_eq!(rig.notifier.successes(), vec!["sdc unmounted from /mnt/nas_backup"]);
}

#[tokio::test]
async fn mounting_primary_offers_to_start_services() {
    let rig = service_rig(
        SnapshotBuilder::new().nas_disk("sdb", 4 * GIB, None),
        &[("smbd", false), ("jellyfin", false)],
    );
    rig.services.refuse_start("jellyfin", "unit masked");
    rig.prompt.push_yes(2);

    let result = rig.operations.mount("sdb", "nas").await.unwrap();
    assert!(result.is_done());
    assert_eq!(rig.prompt.titles(), vec!["Mount", "Start dependent services"]);
    assert!(rig.services.is_running("smbd"));
    assert_eq!(rig.notifier.warnings(), vec!["jellyfin did not start: unit masked"]);
    assert_eq!(
        rig.notifier.successes(),
        vec!["sdb mounted at /mnt/nas", "Started smbd"]
    );
}

#[tokio::test]
async fn unmounting_an_unmounted_device_is_rejected() {
    let rig = TestRig::with_snapshot(SnapshotBuilder::new().nas_disk("sdb", GIB, None));
    let err = rig.operations.unmount("sdb").await.unwrap_err();
    assert_eq!(err.to_string(), "sdb is not mounted");
    assert!(rig.services.calls().is_empty());
}
