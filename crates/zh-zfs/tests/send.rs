// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Send, receive and send-to-receive through a scripted runner.

mod support;

use support::{existence, is_exists_probe, FakeRunner, Scripted, SharedBuffer};
use zh_zfs::{
    ErrorKind, ExecContext, ReceiveOptions, SendRequest, TransferProgress, Zfs, ZfsError,
};

const PROGRESS: &str =
    "full a@c 1075819232\nsize 1075819233\n15:39:14 1228816 a@c\n15:39:15 2279888 a@c\n";

fn zfs(runner: std::sync::Arc<FakeRunner>) -> Zfs {
    Zfs::new(runner, ExecContext::default())
}

#[tokio::test]
async fn test_send_delivers_progress_and_data() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["a@c"])
        } else {
            Scripted::stdout("STREAMDATA").with_stderr(PROGRESS)
        }
    });
    let sink = SharedBuffer::default();
    let mut events = Vec::new();
    let mut callback = |event: TransferProgress| events.push(event);

    let summary = zfs(runner.clone())
        .send(&SendRequest::full("a@c"), sink.clone(), Some(&mut callback))
        .await
        .unwrap();

    assert_eq!(summary.bytes, 10);
    assert_eq!(summary.progress_events, 3);
    assert_eq!(sink.contents(), b"STREAMDATA");

    assert_eq!(events.len(), 3);
    assert!(!events[0].has_report);
    assert!(events[1..].iter().all(|event| event.has_report));
    assert_eq!(events[0].estimated_send_size, 1075819233);
    assert_eq!(events[1].report.as_ref().unwrap().bytes_sent, 1228816);
    assert_eq!(events[2].report.as_ref().unwrap().bytes_sent, 2279888);

    let calls = runner.zfs_calls();
    assert_eq!(calls[0], "list -H -o name -t all a@c");
    assert_eq!(calls[1], "send -P -v a@c");
}

#[tokio::test]
async fn test_send_failure_wins_over_delivered_events() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["a@c"])
        } else {
            Scripted::fail(1, &format!("{PROGRESS}cannot open 'a@c': dataset does not exist\n"))
        }
    });
    let mut events = Vec::new();
    let mut callback = |event: TransferProgress| events.push(event);

    let err = zfs(runner)
        .send(
            &SendRequest::full("a@c"),
            SharedBuffer::default(),
            Some(&mut callback),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::NotFound));

    let progress: Vec<&TransferProgress> =
        events.iter().filter(|event| event.error.is_none()).collect();
    assert_eq!(progress.len(), 3);
    assert!(!progress[0].has_report);
    assert_eq!(progress[2].report.as_ref().unwrap().bytes_sent, 2279888);

    // The trailing diagnostic arrives as an error event before the failure.
    assert_eq!(events.len(), 4);
    assert!(events[3].error.is_some());
}

#[tokio::test]
async fn test_send_without_callback_skips_progress_flags() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["tank/a@s1"])
        } else {
            Scripted::stdout("DATA")
        }
    });

    let summary = zfs(runner.clone())
        .send(&SendRequest::full("tank/a@s1"), SharedBuffer::default(), None)
        .await
        .unwrap();

    assert_eq!(summary.progress_events, 0);
    assert_eq!(runner.zfs_calls()[1], "send tank/a@s1");
}

#[tokio::test]
async fn test_missing_target_is_reported_before_base() {
    let runner = FakeRunner::new(|args| existence(args, &[]));

    let err = zfs(runner.clone())
        .send(
            &SendRequest::incremental("tank/a@s1", "tank/a@s2"),
            SharedBuffer::default(),
            None,
        )
        .await
        .unwrap_err();

    match err {
        ZfsError::Classified(err) => {
            assert_eq!(err.kind, ErrorKind::NotFound);
            assert_eq!(err.dataset.as_deref(), Some("tank/a@s2"));
        }
        other => panic!("expected a classified error, got {other:?}"),
    }
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_base_is_its_own_error() {
    let runner = FakeRunner::new(|args| existence(args, &["tank/a@s2"]));

    let err = zfs(runner.clone())
        .send(
            &SendRequest::incremental("@s1", "tank/a@s2"),
            SharedBuffer::default(),
            None,
        )
        .await
        .unwrap_err();

    match err {
        ZfsError::Classified(err) => {
            assert_eq!(err.kind, ErrorKind::NotFound);
            assert_eq!(err.dataset.as_deref(), Some("tank/a@s1"));
        }
        other => panic!("expected a classified error, got {other:?}"),
    }
    let calls = runner.zfs_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| !call.starts_with("send")));
}

#[tokio::test]
async fn test_send_of_non_snapshot_is_invalid_name() {
    let runner = FakeRunner::new(|_| Scripted::ok());
    let err = zfs(runner.clone())
        .send(&SendRequest::full("tank/a"), SharedBuffer::default(), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidName));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_send_into_broken_sink() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["tank/a@s1"])
        } else {
            Scripted::stdout("DATA")
        }
    });
    let err = zfs(runner)
        .send(
            &SendRequest::full("tank/a@s1"),
            support::BrokenWriter,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::BrokenPipe));
}

#[tokio::test]
async fn test_malformed_header_with_clean_exit() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["tank/a@s1"])
        } else {
            Scripted::ok().with_stderr("something unexpected\n")
        }
    });
    let mut callback = |_event: TransferProgress| {};
    let err = zfs(runner)
        .send(
            &SendRequest::full("tank/a@s1"),
            SharedBuffer::default(),
            Some(&mut callback),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ZfsError::Parse(_)), "{err:?}");
}

#[tokio::test]
async fn test_receive_feeds_stdin() {
    let runner = FakeRunner::new(|_| Scripted::ok());
    let options = ReceiveOptions {
        force_rollback: true,
        ..ReceiveOptions::default()
    };

    let bytes = zfs(runner.clone())
        .receive("tank/b", &b"STREAM"[..], &options)
        .await
        .unwrap();

    assert_eq!(bytes, 6);
    assert_eq!(runner.stdin_bytes(), b"STREAM");
    assert_eq!(runner.zfs_calls(), ["receive -F tank/b"]);
}

#[tokio::test]
async fn test_receive_into_existing_dataset() {
    let runner = FakeRunner::new(|_| {
        Scripted::fail(
            1,
            "cannot receive new filesystem stream: destination 'tank/b' exists\n",
        )
        .rejecting_stdin()
    });

    let err = zfs(runner)
        .receive("tank/b", &b"STREAM"[..], &ReceiveOptions::default())
        .await
        .unwrap_err();

    match err {
        ZfsError::Classified(err) => {
            assert_eq!(err.kind, ErrorKind::BrokenPipe);
            assert_eq!(err.dataset.as_deref(), Some("tank/b"));
            assert!(err.text.contains("destination 'tank/b' exists"));
        }
        other => panic!("expected a classified error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_send_to_pipes_data_into_receiver() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["tank/a@s1"])
        } else if args[0] == "send" {
            Scripted::stdout("PAYLOAD")
        } else {
            Scripted::ok()
        }
    });

    let summary = zfs(runner.clone())
        .send_to(
            &SendRequest::full("tank/a@s1"),
            "backup/a",
            &ReceiveOptions::default(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(summary.bytes, 7);
    assert_eq!(runner.stdin_bytes(), b"PAYLOAD");
    let calls = runner.zfs_calls();
    assert_eq!(calls[1], "receive backup/a");
    assert_eq!(calls[2], "send tank/a@s1");
}

#[tokio::test]
async fn test_send_to_reports_receiver_failure() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["tank/a@s1"])
        } else if args[0] == "send" {
            Scripted::stdout("PAYLOAD")
        } else {
            Scripted::fail(
                1,
                "cannot receive new filesystem stream: destination 'backup/a' exists\n",
            )
            .rejecting_stdin()
        }
    });

    let err = zfs(runner)
        .send_to(
            &SendRequest::full("tank/a@s1"),
            "backup/a",
            &ReceiveOptions::default(),
            None,
        )
        .await
        .unwrap_err();

    match err {
        ZfsError::Classified(err) => {
            assert_eq!(err.kind, ErrorKind::BrokenPipe);
            assert_eq!(err.dataset.as_deref(), Some("backup/a"));
        }
        other => panic!("expected a classified error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sudo_context_prefixes_every_command() {
    let runner = FakeRunner::new(|args| {
        if is_exists_probe(args) {
            existence(args, &["tank/a@s1"])
        } else {
            Scripted::stdout("DATA")
        }
    });
    let zfs = Zfs::new(runner.clone(), ExecContext::sudo("zfs"));

    zfs.send(&SendRequest::full("tank/a@s1"), SharedBuffer::default(), None)
        .await
        .unwrap();

    for call in runner.calls() {
        assert_eq!(call.program, "sudo");
        assert_eq!(call.args[..2], ["-n", "zfs"]);
    }
}
