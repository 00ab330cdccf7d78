//! End-to-end client-plane scenarios: exact-match delivery, wildcard depth
//! rules, and suppressed ACKs alongside unsuppressed bounty delivery.

mod support;

use support::{connect_body, peer_connect, publish, subscribe, RawConn, TestBroker};
use tfes_core::message::Message;

#[test]
fn e1_exact_match_local_only() {
    compio::runtime::Runtime::new().unwrap().block_on(async {
        let broker = TestBroker::start().await;

        let mut c1 = RawConn::connect(&broker.client_addr).await;
        c1.send(&connect_body("a", false)).await;
        assert!(matches!(c1.recv().await, Some(Message::Ack { body, .. }) if body.ok));
        c1.send(&subscribe("time.us")).await;
        assert!(matches!(c1.recv().await, Some(Message::Ack { body, .. }) if body.ok));

        let mut c2 = RawConn::connect(&broker.client_addr).await;
        c2.send(&connect_body("b", false)).await;
        assert!(matches!(c2.recv().await, Some(Message::Ack { body, .. }) if body.ok));
        c2.send(&publish("time.us", serde_json::json!(42))).await;

        match c1.recv().await {
            Some(Message::Bounty { body, .. }) => {
                assert_eq!(body.subject, "time.us");
                assert_eq!(body.body, Some(serde_json::json!(42)));
            }
            other => panic!("expected bounty, got {other:?}"),
        }
        c1.expect_silence().await;

        assert!(matches!(c2.recv().await, Some(Message::Ack { body, .. }) if body.ok));
        c2.expect_silence().await;
    });
}

#[test]
fn e2_single_wildcard_depth_must_match() {
    compio::runtime::Runtime::new().unwrap().block_on(async {
        let broker = TestBroker::start().await;

        let mut c1 = RawConn::connect(&broker.client_addr).await;
        c1.send(&connect_body("a", false)).await;
        c1.recv().await;
        c1.send(&subscribe("time.*")).await;
        c1.recv().await;

        let mut c2 = RawConn::connect(&broker.client_addr).await;
        c2.send(&connect_body("b", false)).await;
        c2.recv().await;

        c2.send(&publish("time.us", serde_json::json!(1))).await;
        assert!(matches!(c1.recv().await, Some(Message::Bounty { .. })));
        c2.recv().await; // ack

        c2.send(&publish("time.us.atlanta", serde_json::json!(1)))
            .await;
        c1.expect_silence().await;
    });
}

#[test]
fn e3_tail_wildcard_matches_any_depth_but_wrong_prefix() {
    compio::runtime::Runtime::new().unwrap().block_on(async {
        let broker = TestBroker::start().await;

        let mut c1 = RawConn::connect(&broker.client_addr).await;
        c1.send(&connect_body("a", false)).await;
        c1.recv().await;
        c1.send(&subscribe("time.>")).await;
        c1.recv().await;

        let mut c2 = RawConn::connect(&broker.client_addr).await;
        c2.send(&connect_body("b", false)).await;
        c2.recv().await;

        c2.send(&publish("time.us", serde_json::json!(1))).await;
        assert!(matches!(c1.recv().await, Some(Message::Bounty { .. })));
        c2.recv().await;

        c2.send(&publish("time.us.atlanta", serde_json::json!(1)))
            .await;
        assert!(matches!(c1.recv().await, Some(Message::Bounty { .. })));
        c2.recv().await;

        c2.send(&publish("weather.us", serde_json::json!(1))).await;
        c1.expect_silence().await;
    });
}

#[test]
fn e4_suppress_acks_still_delivers_bounties_from_a_peer() {
    compio::runtime::Runtime::new().unwrap().block_on(async {
        let broker = TestBroker::start().await;

        let mut c1 = RawConn::connect(&broker.client_addr).await;
        c1.send(&connect_body("a", true)).await;
        c1.send(&subscribe("x")).await;
        c1.expect_silence().await;

        let mut peer = RawConn::connect(&broker.peer_addr).await;
        peer.send(&peer_connect("b", "127.0.0.1:1")).await;
        peer.send(&publish("x", serde_json::json!("hi"))).await;

        match c1.recv().await {
            Some(Message::Bounty { body, .. }) => assert_eq!(body.subject, "x"),
            other => panic!("expected bounty, got {other:?}"),
        }
    });
}
