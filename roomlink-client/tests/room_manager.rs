mod support;

use instant::{Duration, Instant};
use roomlink_client::{
    Backoff, ClientEvent, JoinFailure, LinkState, LocalRequest, Notification, PeerCommand,
    PeerEvent, PeerMessage,
};
use roomlink_core::{
    ClientMessage, RejectReason, RoomId, RoomSnapshot, RoomStatus, ServerMessage, SignalEnvelope,
    SignalKind,
};
use support::{
    data, member, notifications, ordered_ids, peer_commands, relay_messages, send_targets, Script,
};

#[test]
fn test_smaller_session_id_initiates() {
    let ids = ordered_ids(3);
    let mut script = Script::new();
    script.authenticate_as(ids[1]);

    let out = script.join_with(&[ids[0], ids[2]]);
    let prepares = peer_commands(&out);

    assert!(prepares.contains(&PeerCommand::Prepare {
        remote_id: ids[0],
        initiator: false,
    }));
    assert!(prepares.contains(&PeerCommand::Prepare {
        remote_id: ids[2],
        initiator: true,
    }));
    assert_eq!(script.manager.link_state(&ids[0]), Some(LinkState::Negotiating));
    assert_eq!(script.manager.link_state(&ids[2]), Some(LinkState::Negotiating));
}

#[test]
fn test_member_joined_opens_link() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[]);

    let out = script.relay(ServerMessage::MemberJoined {
        room_id: script.room_id.clone(),
        member: member(ids[1], "late", false),
    });

    assert_eq!(
        peer_commands(&out),
        vec![PeerCommand::Prepare {
            remote_id: ids[1],
            initiator: true,
        }]
    );
    let room = script.manager.room().unwrap();
    assert_eq!(room.members.len(), 2);
    assert_eq!(room.status, RoomStatus::Active);
}

#[test]
fn test_chat_only_over_connected_links() {
    let ids = ordered_ids(3);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1], ids[2]]);

    script.open_channel(ids[1]);
    assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Connected));

    let broadcast = script.chat(None, "hello");
    assert_eq!(send_targets(&broadcast), vec![ids[1]]);

    let direct = script.chat(Some(ids[2]), "psst");
    assert!(send_targets(&direct).is_empty());
}

#[test]
fn test_connected_link_reported_to_relay() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);

    let out = script.open_channel(ids[1]);
    match relay_messages(&out).as_slice() {
        [ClientMessage::ConnectionReport {
            remote_id, success, ..
        }] => {
            assert_eq!(*remote_id, ids[1]);
            assert!(*success);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_member_left_tears_down_negotiating_link() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Negotiating));

    let out = script.relay(ServerMessage::MemberLeft {
        room_id: script.room_id.clone(),
        session_id: ids[1],
    });

    assert!(peer_commands(&out).contains(&PeerCommand::Close { remote_id: ids[1] }));
    assert!(notifications(&out).contains(&Notification::MemberLeft { session_id: ids[1] }));
    assert!(script.manager.link(&ids[1]).is_none());
    assert_eq!(script.manager.room().unwrap().members.len(), 1);
}

#[test]
fn test_negotiation_timeout_retries_then_gives_up() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    let backoff = Backoff::link_retry();

    let mut now = Instant::now() + Duration::from_secs(16);
    for attempt in 1..=backoff.max_attempts {
        let failed = script.feed(ClientEvent::Tick(now));
        assert!(notifications(&failed).contains(&Notification::PeerError {
            remote_id: ids[1],
            error: "negotiation timed out".to_string(),
            terminal: false,
        }));
        assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Errored));

        now += backoff.delay(attempt).unwrap();
        let retried = script.feed(ClientEvent::Tick(now));
        assert!(peer_commands(&retried).contains(&PeerCommand::Prepare {
            remote_id: ids[1],
            initiator: true,
        }));
        assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Negotiating));

        now += Duration::from_secs(15);
    }

    let exhausted = script.feed(ClientEvent::Tick(now));
    assert!(notifications(&exhausted).contains(&Notification::PeerError {
        remote_id: ids[1],
        error: "negotiation timed out".to_string(),
        terminal: true,
    }));
    assert!(script.manager.link(&ids[1]).is_none());
    assert!(relay_messages(&exhausted).iter().any(|m| matches!(
        m,
        ClientMessage::ConnectionReport { success: false, .. }
    )));
}

#[test]
fn test_transport_failure_on_connected_link_retries() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[1]);
    script.join_with(&[ids[0]]);
    script.open_channel(ids[0]);

    let out = script.peer(PeerEvent::ChannelFailed {
        remote_id: ids[0],
        reason: "ice failed".to_string(),
    });

    assert!(peer_commands(&out).contains(&PeerCommand::Close { remote_id: ids[0] }));
    assert_eq!(script.manager.link_state(&ids[0]), Some(LinkState::Errored));
    assert!(send_targets(&script.chat(None, "anyone?")).is_empty());
}

#[test]
fn test_graceful_close_keeps_link_closed() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    script.open_channel(ids[1]);

    script.peer(PeerEvent::ChannelClosed { remote_id: ids[1] });
    assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Closed));

    let later = script.feed(ClientEvent::Tick(Instant::now() + Duration::from_secs(20)));
    assert!(peer_commands(&later).is_empty());
}

#[test]
fn test_duplicate_and_stale_sequences_dropped() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    script.open_channel(ids[1]);

    let mut received = Vec::new();
    for (seq, text) in [(1, "a"), (1, "dup"), (0, "old"), (2, "b")] {
        let out = script.peer(PeerEvent::Data {
            remote_id: ids[1],
            bytes: data(seq, text),
        });
        for notification in notifications(&out) {
            if let Notification::PeerMessage {
                message: PeerMessage::Chat { text },
                ..
            } = notification
            {
                received.push(text);
            }
        }
    }

    assert_eq!(received, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_data_on_negotiating_link_ignored() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);

    let out = script.peer(PeerEvent::Data {
        remote_id: ids[1],
        bytes: data(0, "early"),
    });
    assert!(out.is_empty());
}

#[test]
fn test_failed_join_leaves_state_unchanged() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);

    let sent = script.request(LocalRequest::JoinRoom {
        room_id: RoomId::from("room0002"),
        password: Some("wrong".to_string()),
    });
    let correlation_id = relay_messages(&sent)[0].correlation_id();
    let out = script.relay(ServerMessage::Rejected {
        correlation_id,
        reason: RejectReason::BadPassword,
        message: "wrong password".to_string(),
    });

    assert_eq!(
        notifications(&out),
        vec![Notification::JoinFailed {
            room_id: Some(RoomId::from("room0002")),
            reason: JoinFailure::Rejected(RejectReason::BadPassword),
            message: "wrong password".to_string(),
        }]
    );
    assert_eq!(script.manager.room().unwrap().room_id, script.room_id);
    assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Negotiating));
}

#[test]
fn test_rejected_signal_errors_link() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);

    let sent = script.peer(PeerEvent::LocalSignal {
        remote_id: ids[1],
        kind: SignalKind::Offer,
        payload: b"v=0".to_vec(),
    });
    let signal = &relay_messages(&sent)[0];
    match signal {
        ClientMessage::Signal { envelope, .. } => {
            assert_eq!(envelope.from_session_id, ids[0]);
            assert_eq!(envelope.to_session_id, ids[1]);
            assert_eq!(envelope.room_id, script.room_id);
        }
        other => panic!("unexpected {:?}", other),
    }

    let out = script.relay(ServerMessage::Rejected {
        correlation_id: signal.correlation_id(),
        reason: RejectReason::NotInSameRoom,
        message: "not in the same room".to_string(),
    });

    assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Errored));
    assert!(notifications(&out)
        .iter()
        .any(|n| matches!(n, Notification::PeerError { terminal: false, .. })));
}

#[test]
fn test_acked_signals_do_not_accumulate() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    let baseline = script.manager.pending_request_count();

    for n in 0..200u32 {
        let sent = script.peer(PeerEvent::LocalSignal {
            remote_id: ids[1],
            kind: SignalKind::Candidate,
            payload: n.to_be_bytes().to_vec(),
        });
        let correlation_id = relay_messages(&sent)[0].correlation_id();
        script.relay(ServerMessage::Ack { correlation_id });
    }

    assert_eq!(script.manager.pending_request_count(), baseline);
    assert_eq!(script.manager.link_state(&ids[1]), Some(LinkState::Negotiating));
}

#[test]
fn test_remote_signal_restarts_errored_link() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[1]);
    script.join_with(&[ids[0]]);
    script.peer(PeerEvent::ChannelFailed {
        remote_id: ids[0],
        reason: "gone".to_string(),
    });

    let out = script.relay(ServerMessage::Signal {
        envelope: SignalEnvelope::new(
            SignalKind::Offer,
            ids[0],
            ids[1],
            script.room_id.clone(),
            b"offer".to_vec(),
        ),
    });

    assert_eq!(
        peer_commands(&out),
        vec![
            PeerCommand::Prepare {
                remote_id: ids[0],
                initiator: false,
            },
            PeerCommand::ApplySignal {
                remote_id: ids[0],
                kind: SignalKind::Offer,
                payload: b"offer".to_vec(),
            },
        ]
    );
    assert_eq!(script.manager.link_state(&ids[0]), Some(LinkState::Negotiating));
}

#[test]
fn test_signal_from_stranger_dropped() {
    let ids = ordered_ids(3);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);

    let out = script.relay(ServerMessage::Signal {
        envelope: SignalEnvelope::new(
            SignalKind::Offer,
            ids[2],
            ids[0],
            script.room_id.clone(),
            b"offer".to_vec(),
        ),
    });
    assert!(out.is_empty());
}

#[test]
fn test_signals_queued_until_rejoin() {
    let ids = ordered_ids(3);
    let (old_local, remote, new_local) = (ids[0], ids[1], ids[2]);
    let mut script = Script::new();
    script.authenticate_as(old_local);
    script.join_with(&[remote]);

    let dropped = script.feed(ClientEvent::RelayDisconnected);
    assert_eq!(
        notifications(&dropped),
        vec![Notification::Disconnected { terminal: false }]
    );

    for payload in [b"c1".to_vec(), b"c2".to_vec()] {
        let out = script.peer(PeerEvent::LocalSignal {
            remote_id: remote,
            kind: SignalKind::Candidate,
            payload,
        });
        assert!(relay_messages(&out).is_empty());
    }
    assert_eq!(script.manager.queued_signal_count(), 2);

    let out = script.authenticate_as(new_local);
    let rejoin = relay_messages(&out);
    let correlation_id = match rejoin.as_slice() {
        [ClientMessage::JoinRoom {
            correlation_id,
            room_id,
            ..
        }] => {
            assert_eq!(room_id, &script.room_id);
            *correlation_id
        }
        other => panic!("unexpected {:?}", other),
    };

    let out = script.relay(ServerMessage::RoomJoined {
        correlation_id,
        room: RoomSnapshot {
            room_id: script.room_id.clone(),
            name: "Lobby".to_string(),
            host_id: remote,
            members: vec![member(remote, "remote", true), member(new_local, "local", false)],
            max_members: 8,
            status: RoomStatus::Active,
            private: false,
        },
    });

    let payloads: Vec<(Vec<u8>, _)> = relay_messages(&out)
        .into_iter()
        .filter_map(|m| match m {
            ClientMessage::Signal { envelope, .. } => {
                Some((envelope.payload, envelope.from_session_id))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        payloads,
        vec![(b"c1".to_vec(), new_local), (b"c2".to_vec(), new_local)]
    );
    assert_eq!(script.manager.queued_signal_count(), 0);
}

#[test]
fn test_failed_rejoin_drops_room() {
    let ids = ordered_ids(3);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    script.feed(ClientEvent::RelayDisconnected);

    let out = script.authenticate_as(ids[2]);
    let correlation_id = relay_messages(&out)[0].correlation_id();
    let out = script.relay(ServerMessage::Rejected {
        correlation_id,
        reason: RejectReason::NotFound,
        message: "room not found".to_string(),
    });

    assert!(peer_commands(&out).contains(&PeerCommand::Close { remote_id: ids[1] }));
    assert!(script.manager.room().is_none());
    assert_eq!(script.manager.links().count(), 0);
}

#[test]
fn test_leave_closes_links() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);
    script.open_channel(ids[1]);

    let out = script.request(LocalRequest::LeaveRoom);
    assert!(peer_commands(&out).contains(&PeerCommand::Close { remote_id: ids[1] }));
    let leave = relay_messages(&out);
    assert!(matches!(leave.as_slice(), [ClientMessage::LeaveRoom { .. }]));

    let out = script.relay(ServerMessage::RoomLeft {
        correlation_id: leave[0].correlation_id(),
        room_id: Some(script.room_id.clone()),
        destroyed: false,
    });
    assert!(notifications(&out).contains(&Notification::RoomLeft {
        room_id: Some(script.room_id.clone()),
        destroyed: false,
    }));
    assert!(script.manager.room().is_none());
}

#[test]
fn test_room_closed_push_clears_room() {
    let ids = ordered_ids(2);
    let mut script = Script::new();
    script.authenticate_as(ids[0]);
    script.join_with(&[ids[1]]);

    let out = script.relay(ServerMessage::RoomClosed {
        room_id: script.room_id.clone(),
        reason: "inactive".to_string(),
    });

    assert!(peer_commands(&out).contains(&PeerCommand::Close { remote_id: ids[1] }));
    assert!(script.manager.room().is_none());

    // No rejoin after a reconnect
    script.feed(ClientEvent::RelayDisconnected);
    let out = script.authenticate_as(ids[0]);
    assert!(relay_messages(&out).is_empty());
}
