//! End-to-end transaction behaviour against a live `Mdib`.

use mdib_core::{
    ContextAssociation, Descriptor, Entity, Kind, MetricValue, ReportKind, SampleArrayValue,
    State, StateCategory,
};
use mdib_store::MdibStore;
use mdib_transaction::{
    ErrorKind, Mdib, MdibConfig, MdibConfigBuilder, TransactionError, TransactionKind,
    TransactionResult, TransactionStatus,
};
use std::sync::Arc;

fn device() -> Mdib {
    let mdib = Mdib::default();
    mdib.load(
        vec![
            Descriptor::mds("mds"),
            Descriptor::child(Kind::SystemContext, "sc", "mds"),
            Descriptor::child(Kind::PatientContext, "pat", "sc"),
            Descriptor::child(Kind::Vmd, "vmd", "mds"),
            Descriptor::child(Kind::Channel, "ch", "vmd"),
            Descriptor::child(Kind::NumericMetric, "hr", "ch"),
            Descriptor::child(Kind::NumericMetric, "spo2", "ch"),
            Descriptor::child(Kind::RealTimeSampleArrayMetric, "ecg", "ch"),
            Descriptor::child(Kind::AlertSystem, "asys", "mds"),
            Descriptor::child(Kind::AlertCondition, "ac", "asys"),
        ],
        Vec::new(),
    )
    .unwrap();
    mdib
}

#[test]
fn test_descriptor_lifecycle_scenario() {
    let mdib = Mdib::default();

    let mut tx = mdib.transaction(TransactionKind::Descriptor);
    tx.add_descriptor(Descriptor::mds("mds1"), false, None).unwrap();
    let result = tx.commit().unwrap();
    drop(tx);
    assert_eq!(result.mdib_version(), 1);
    assert_eq!(result.descr_created.len(), 1);

    let mut tx = mdib.transaction(TransactionKind::Descriptor);
    tx.add_descriptor(Descriptor::child(Kind::Vmd, "vmd1", "mds1"), false, None)
        .unwrap();
    let result = tx.commit().unwrap();
    drop(tx);
    assert_eq!(result.mdib_version(), 2);
    assert_eq!(result.descr_updated.len(), 1);
    assert_eq!(result.descr_updated[0].handle().as_str(), "mds1");
    assert_eq!(result.descr_updated[0].descriptor_version(), 1);

    let mut tx = mdib.transaction(TransactionKind::Descriptor);
    tx.remove_descriptor("vmd1").unwrap();
    let result = tx.commit().unwrap();
    drop(tx);
    assert_eq!(result.mdib_version(), 3);
    assert_eq!(result.descr_deleted.len(), 1);
    assert_eq!(
        mdib.read(|store| store.descriptor("mds1").map(|d| d.descriptor_version())),
        Some(2)
    );
}

#[test]
fn test_cascade_delete_removes_subtree_and_states() {
    let mdib = device();
    let (_, result) = mdib
        .with_transaction(TransactionKind::Descriptor, |tx| tx.remove_descriptor("vmd"))
        .unwrap();

    // vmd, ch, hr, spo2, ecg
    assert_eq!(result.descr_deleted.len(), 5);
    assert_eq!(result.deleted_states.len(), 5);
    assert_eq!(result.descr_updated.len(), 1);
    assert_eq!(result.descr_updated[0].handle().as_str(), "mds");

    mdib.read(|store| {
        assert!(store.get_all_descriptors_in_subtree("vmd", true, true).is_empty());
        assert!(store.state("hr").is_none());
        assert!(store.state("ecg").is_none());
        assert_eq!(store.descriptor("mds").unwrap().descriptor_version(), 1);
    });
}

#[test]
fn test_parent_state_follows_parent_version() {
    let mdib = device();
    let (_, result) = mdib
        .with_transaction(TransactionKind::Descriptor, |tx| {
            tx.add_descriptor(Descriptor::child(Kind::NumericMetric, "rr", "ch"), false, None)
        })
        .unwrap();

    let ch_state = result
        .updates(StateCategory::Component)
        .iter()
        .find(|s| s.descriptor_handle().as_str() == "ch")
        .expect("channel state restaged");
    assert_eq!(ch_state.descriptor_version(), 1);
    assert_eq!(ch_state.state_version(), 1);

    let rr_state = result
        .updates(StateCategory::Metric)
        .iter()
        .find(|s| s.descriptor_handle().as_str() == "rr")
        .expect("default state created");
    assert_eq!(rr_state.descriptor_version(), 0);
    assert_eq!(
        result.report_kinds(),
        vec![
            ReportKind::DescriptionModification,
            ReportKind::EpisodicMetric,
            ReportKind::EpisodicComponent,
        ]
    );
}

#[test]
fn test_adding_and_removing_siblings_bumps_parent_once() {
    let mdib = device();
    let (_, result) = mdib
        .with_transaction(TransactionKind::Descriptor, |tx| {
            tx.add_descriptor(Descriptor::child(Kind::NumericMetric, "rr", "ch"), false, None)?;
            tx.remove_descriptor("spo2")
        })
        .unwrap();

    assert_eq!(result.descr_updated.len(), 1);
    assert_eq!(result.descr_updated[0].descriptor_version(), 1);
    assert_eq!(result.mdib_version(), 1);
}

#[test]
fn test_unbound_transaction_rejects_second_category() {
    let mdib = device();
    let before = mdib.snapshot();

    let mut tx = mdib.transaction(TransactionKind::Unbound);
    tx.get_state("hr")
        .unwrap()
        .set_metric_value(MetricValue::numeric(80.0));
    assert_eq!(tx.bound_category(), Some(StateCategory::Metric));

    let err = tx.get_state("ac").unwrap_err();
    assert_eq!(
        err,
        TransactionError::CategoryMismatch {
            bound: StateCategory::Metric,
            found: StateCategory::Alert,
        }
    );
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(tx.status(), TransactionStatus::Poisoned);
    assert_eq!(tx.commit().unwrap_err(), TransactionError::Poisoned);
    drop(tx);

    assert_eq!(mdib.snapshot(), before);
}

#[test]
fn test_unbound_transaction_rebinds_after_unget() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::Unbound);
    tx.get_state("hr").unwrap();
    assert_eq!(tx.bound_category(), Some(StateCategory::Metric));
    tx.unget_state("hr").unwrap();
    assert_eq!(tx.bound_category(), None);

    if let Some(condition) = tx.get_state("ac").unwrap().as_alert_condition_mut() {
        condition.presence = Some(true);
    }
    assert_eq!(tx.bound_category(), Some(StateCategory::Alert));
    let result = tx.commit().unwrap();
    drop(tx);

    assert!(result.updates(StateCategory::Metric).is_empty());
    assert_eq!(result.updates(StateCategory::Alert).len(), 1);
}

#[test]
fn test_metric_transaction_stays_bound_after_unget() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    tx.get_state("hr").unwrap();
    tx.unget_state("hr").unwrap();
    assert_eq!(tx.bound_category(), Some(StateCategory::Metric));
    assert!(matches!(
        tx.get_state("ac").unwrap_err(),
        TransactionError::CategoryMismatch { .. }
    ));
}

#[test]
fn test_state_transaction_rejects_descriptor_changes() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    let err = tx.remove_descriptor("hr").unwrap_err();
    assert!(matches!(err, TransactionError::WrongKind { .. }));
}

#[test]
fn test_metric_transaction_rejects_alert_state() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    tx.get_state("hr").unwrap();
    assert!(matches!(
        tx.get_state("ac"),
        Err(TransactionError::CategoryMismatch { .. })
    ));
    tx.abort();
    assert_eq!(tx.status(), TransactionStatus::Aborted);
    assert_eq!(mdib.mdib_version(), 0);
}

#[test]
fn test_closed_transaction_rejects_calls() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    tx.get_state("hr").unwrap();
    tx.commit().unwrap();

    assert_eq!(tx.status(), TransactionStatus::Committed);
    assert_eq!(tx.get_state("spo2").unwrap_err(), TransactionError::Closed);
    assert_eq!(tx.commit().unwrap_err(), TransactionError::Closed);
}

#[test]
fn test_get_state_twice_fails() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    tx.get_state("hr").unwrap();
    assert_eq!(
        tx.get_state("hr").unwrap_err(),
        TransactionError::AlreadyStaged("hr".into())
    );
}

#[test]
fn test_unget_state_drops_staged_change() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    tx.get_state("hr")
        .unwrap()
        .set_metric_value(MetricValue::numeric(99.0));
    assert!(tx.has_state("hr"));

    tx.unget_state("hr").unwrap();
    assert!(!tx.has_state("hr"));
    assert!(tx.is_empty());

    let result = tx.commit().unwrap();
    assert!(result.is_empty());
    assert_eq!(mdib.mdib_version(), 0);
}

#[test]
fn test_unget_unknown_state_fails() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::metric());
    assert_eq!(
        tx.unget_state("hr").unwrap_err(),
        TransactionError::NotStaged("hr".into())
    );
}

#[test]
fn test_metric_update_bumps_state_version() {
    let mdib = device();
    let (_, result) = mdib
        .with_transaction(TransactionKind::metric(), |tx| {
            tx.get_state("hr")?.set_metric_value(MetricValue::numeric(72.0));
            Ok(())
        })
        .unwrap();

    assert!(!result.has_descriptor_updates());
    assert_eq!(result.report_kinds(), vec![ReportKind::EpisodicMetric]);
    mdib.read(|store| {
        let hr = store.state("hr").unwrap();
        assert_eq!(hr.state_version(), 1);
        let value = hr.as_metric().and_then(|m| m.metric_value.as_ref()).unwrap();
        assert!(value.determination_time.is_some());
        assert_eq!(store.mdstate_version(), 1);
        assert_eq!(store.mddescription_version(), 0);
    });
}

#[test]
fn test_real_time_transaction_skips_stamping() {
    let mdib = device();
    let (_, result) = mdib
        .with_transaction(TransactionKind::RealTimeSample, |tx| {
            let ecg = tx.get_state("ecg")?;
            if let Some(detail) = ecg.as_sample_array_mut() {
                detail.metric_value = Some(SampleArrayValue {
                    samples: vec![0.1, 0.4, 0.2],
                    ..SampleArrayValue::default()
                });
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(result.report_kinds(), vec![ReportKind::Waveform]);
    let ecg = &result.rt_updates[0];
    let value = ecg
        .as_sample_array()
        .and_then(|d| d.metric_value.as_ref())
        .unwrap();
    assert_eq!(value.samples.len(), 3);
    assert!(value.determination_time.is_none());
}

#[test]
fn test_real_time_transaction_rejects_metric() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::RealTimeSample);
    assert!(matches!(
        tx.get_state("hr"),
        Err(TransactionError::CategoryMismatch { .. })
    ));
}

#[test]
fn test_context_binding_and_disassociation() {
    let mdib = device();

    let (handle, result) = mdib
        .with_transaction(TransactionKind::context(), |tx| {
            let state = tx.mk_context_state("pat", None, false, true)?;
            Ok(state.handle().cloned())
        })
        .unwrap();
    let first = handle.unwrap();
    assert_eq!(result.mdib_version(), 1);
    let bound = &result.context_updates[0];
    let detail = bound.as_context().unwrap();
    assert_eq!(detail.association, Some(ContextAssociation::Associated));
    assert_eq!(detail.binding_mdib_version, Some(1));
    assert!(detail.binding_start_time.is_some());

    let ((second, touched), result) = mdib
        .with_transaction(TransactionKind::context(), |tx| {
            let second = tx
                .mk_context_state("pat", None, false, true)?
                .handle()
                .cloned();
            let touched = tx.disassociate_all("pat", second.as_ref().map(|h| h.as_str()))?;
            Ok((second, touched))
        })
        .unwrap();
    assert_eq!(touched, vec![first.clone()]);
    assert_eq!(result.context_updates.len(), 2);

    mdib.read(|store| {
        let old = store.context_state(first.as_str()).unwrap();
        let detail = old.as_context().unwrap();
        assert_eq!(detail.association, Some(ContextAssociation::Disassociated));
        assert_eq!(detail.unbinding_mdib_version, Some(2));
        assert!(detail.binding_end_time.is_some());
        assert_eq!(old.state_version(), 1);

        let new = store
            .context_state(second.as_ref().unwrap().as_str())
            .unwrap();
        assert_eq!(new.context_association(), Some(ContextAssociation::Associated));
        assert_eq!(store.context_states_of("pat").len(), 2);
    });
}

#[test]
fn test_context_state_needs_context_descriptor() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::context());
    let err = tx.mk_context_state("hr", None, false, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn test_add_state_for_staged_descriptor() {
    let config = MdibConfigBuilder::new().create_missing_states(false).build();
    let mdib = Mdib::new(config);
    let mds = Descriptor::mds("mds");
    let state = State::new(&mds);

    let (_, result) = mdib
        .with_transaction(TransactionKind::Descriptor, |tx| {
            tx.add_descriptor(mds, false, Some(state))
        })
        .unwrap();
    assert_eq!(result.updates(StateCategory::Component).len(), 1);
    assert!(mdib.read(|store| store.state("mds").is_some()));
}

#[test]
fn test_add_state_twice_is_rejected() {
    let mdib = device();
    let hr = mdib.read(|store| store.descriptor("hr").cloned()).unwrap();
    let mut tx = mdib.transaction(TransactionKind::metric());
    let err = tx.add_state(State::new(&hr), false).unwrap_err();
    assert_eq!(err, TransactionError::DuplicateHandle("hr".into()));
    assert_eq!(err.kind(), ErrorKind::Consistency);
}

#[test]
fn test_recreated_descriptor_continues_version_history() {
    let mdib = device();
    for _ in 0..2 {
        let mut tx = mdib.transaction(TransactionKind::Descriptor);
        tx.get_descriptor("spo2").unwrap();
        tx.commit().unwrap();
    }
    mdib.with_transaction(TransactionKind::Descriptor, |tx| tx.remove_descriptor("spo2"))
        .unwrap();

    let (_, result) = mdib
        .with_transaction(TransactionKind::Descriptor, |tx| {
            tx.add_descriptor(Descriptor::child(Kind::NumericMetric, "spo2", "ch"), true, None)
        })
        .unwrap();

    assert_eq!(result.descr_created[0].descriptor_version(), 3);
    mdib.read(|store| {
        let state = store.state("spo2").unwrap();
        assert_eq!(state.descriptor_version(), 3);
        assert!(state.state_version() >= 3);
    });
}

#[test]
fn test_recreated_context_state_continues_version_history() {
    let mdib = device();
    mdib.with_transaction(TransactionKind::context(), |tx| {
        tx.mk_context_state("pat", Some("pat_1".into()), false, true)
            .map(|_| ())
    })
    .unwrap();
    for _ in 0..2 {
        mdib.with_transaction(TransactionKind::context(), |tx| {
            tx.get_context_state("pat_1").map(|_| ())
        })
        .unwrap();
    }
    let highest = mdib.read(|store| store.context_state("pat_1").unwrap().state_version());
    assert_eq!(highest, 2);

    mdib.with_transaction(TransactionKind::Descriptor, |tx| tx.remove_descriptor("pat"))
        .unwrap();
    assert!(mdib.read(|store| store.context_state("pat_1").is_none()));

    let (version, result) = mdib
        .with_transaction(TransactionKind::Descriptor, |tx| {
            tx.add_descriptor(Descriptor::child(Kind::PatientContext, "pat", "sc"), true, None)?;
            let state = tx.mk_context_state("pat", Some("pat_1".into()), true, true)?;
            Ok(state.state_version())
        })
        .unwrap();

    assert!(version > highest);
    assert_eq!(result.context_updates[0].state_version(), version);
    mdib.read(|store| {
        let state = store.context_state("pat_1").unwrap();
        assert_eq!(state.state_version(), highest + 1);
        assert_eq!(state.context_association(), Some(ContextAssociation::Associated));
    });
}

#[test]
fn test_recreated_descriptor_after_reload_continues_version_history() {
    let mdib = device();
    mdib.with_transaction(TransactionKind::Descriptor, |tx| tx.get_descriptor("vmd").map(|_| ()))
        .unwrap();
    mdib.with_transaction(TransactionKind::Descriptor, |tx| tx.remove_descriptor("vmd"))
        .unwrap();

    let store = MdibStore::from_json(&mdib.to_json().unwrap()).unwrap();
    let reloaded = Mdib::from_store(store, MdibConfig::default());
    assert_eq!(reloaded.version_group(), mdib.version_group());

    let (_, result) = reloaded
        .with_transaction(TransactionKind::Descriptor, |tx| {
            tx.add_descriptor(Descriptor::child(Kind::Vmd, "vmd", "mds"), true, None)
        })
        .unwrap();
    assert_eq!(result.descr_created[0].descriptor_version(), 2);
}

#[test]
fn test_update_cannot_change_parent() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::Descriptor);
    tx.add_descriptor(Descriptor::child(Kind::Channel, "ch2", "vmd"), false, None)
        .unwrap();
    let hr = tx.get_descriptor("hr").unwrap();
    *hr = Descriptor::child(Kind::NumericMetric, "hr", "ch2").with_version(hr.descriptor_version());

    let err = tx.commit().unwrap_err();
    assert!(matches!(err, TransactionError::ImmutableField { field: "parent_handle", .. }));
    assert_eq!(tx.status(), TransactionStatus::Poisoned);
    drop(tx);
    assert!(mdib.read(|store| store.descriptor("ch2").is_none()));
}

#[test]
fn test_try_transaction_while_open() {
    let mdib = device();
    let tx = mdib.transaction(TransactionKind::Descriptor);
    assert_eq!(
        mdib.try_transaction(TransactionKind::metric()).unwrap_err(),
        TransactionError::TransactionInProgress
    );
    drop(tx);
    assert!(mdib.try_transaction(TransactionKind::metric()).is_ok());
}

#[test]
fn test_dropping_open_transaction_discards_changes() {
    let mdib = device();
    {
        let mut tx = mdib.transaction(TransactionKind::Descriptor);
        tx.remove_descriptor("vmd").unwrap();
    }
    assert!(mdib.read(|store| store.descriptor("vmd").is_some()));
    assert_eq!(mdib.mdib_version(), 0);
}

#[test]
fn test_observer_sees_each_commit() {
    let mdib = device();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = mdib.register_observer(Arc::new(move |result: &TransactionResult| {
        sink.lock().push(result.mdib_version());
    }));

    for value in [60.0, 61.0] {
        mdib.with_transaction(TransactionKind::metric(), |tx| {
            tx.get_state("hr")?.set_metric_value(MetricValue::numeric(value));
            Ok(())
        })
        .unwrap();
    }
    // Empty commits are not published.
    mdib.with_transaction(TransactionKind::metric(), |_| Ok(()))
        .unwrap();

    assert!(mdib.unregister_observer(id));
    mdib.with_transaction(TransactionKind::metric(), |tx| {
        tx.get_state("hr").map(|_| ())
    })
    .unwrap();

    assert_eq!(*seen.lock(), vec![1, 2]);
}

#[tokio::test]
async fn test_subscribers_receive_results_in_order() {
    let mdib = device();
    let mut rx = mdib.subscribe();

    mdib.with_transaction(TransactionKind::Descriptor, |tx| {
        tx.add_descriptor(Descriptor::child(Kind::NumericMetric, "rr", "ch"), false, None)
    })
    .unwrap();
    mdib.with_transaction(TransactionKind::alert(), |tx| {
        if let Some(condition) = tx.get_state("ac")?.as_alert_condition_mut() {
            condition.presence = Some(true);
        }
        Ok(())
    })
    .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.mdib_version(), 1);
    assert!(first.has_descriptor_updates());
    assert_eq!(second.mdib_version(), 2);
    assert_eq!(second.report_kinds(), vec![ReportKind::EpisodicAlert]);
    let ac = &second.alert_updates[0];
    assert!(ac.as_alert_condition().unwrap().determination_time.is_some());
}

#[test]
fn test_staged_descriptor_is_visible_before_commit() {
    let mdib = device();
    let mut tx = mdib.transaction(TransactionKind::Descriptor);
    tx.get_descriptor("hr").unwrap();
    assert_eq!(tx.staged_descriptor("hr").unwrap().descriptor_version(), 1);
    assert_eq!(tx.kind(), TransactionKind::Descriptor);
    assert_eq!(
        mdib.read(|store| store.descriptor("hr").map(|d| d.descriptor_version())),
        Some(0)
    );
    assert_eq!(mdib.read(|store| store.descriptor("hr").map(|d| d.kind())), Some(Kind::NumericMetric));
}
