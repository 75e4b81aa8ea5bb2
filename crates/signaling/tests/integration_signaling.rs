//! Integration-Tests fuer den Signaling-Server (echter TCP-Server auf Loopback)
//!
//! Der Server laeuft in einem eigenen Thread mit eigener Runtime, weil er
//! seine Verbindungen in einer `LocalSet` ausfuehrt.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use echo_auth::{AuthGate, EnvelopeValidator};
use echo_core::{ConnectionId, RoomId, SessionIdentity};
use echo_crypto::{hash_identity, issue_credential, KdfParameter, KdfPool};
use echo_protocol::control::{ControlMessage, ControlPayload, ErrorCode, HandshakeRequest, RoomLeaveRequest};
use echo_protocol::FrameCodec;
use echo_signaling::{RoomOrchestrator, SignalingConfig, SignalingServer, SignalingState};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, FrameCodec>;

const GEHEIMNIS: &str = "integration-geheimnis";

struct TestServer {
    addr: SocketAddr,
    state: Arc<SignalingState>,
    shutdown: watch::Sender<bool>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

fn server_starten(config: SignalingConfig, gate: AuthGate) -> TestServer {
    let state = SignalingState::neu(config, gate, RoomOrchestrator::default(), None);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();

    let server_state = Arc::clone(&state);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Runtime konnte nicht erstellt werden");
        rt.block_on(async move {
            let server = SignalingServer::binden(server_state, "127.0.0.1:0".parse().unwrap())
                .await
                .expect("Binden fehlgeschlagen");
            addr_tx.send(server.lokale_adresse().unwrap()).unwrap();
            server.starten(shutdown_rx).await.expect("Server-Fehler");
        });
    });

    let addr = addr_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("Server nicht gestartet");
    TestServer {
        addr,
        state,
        shutdown,
    }
}

fn standard_server() -> TestServer {
    server_starten(SignalingConfig::default(), AuthGate::praesenz())
}

async fn verbinden(addr: SocketAddr) -> Client {
    let stream = TcpStream::connect(addr).await.expect("Verbindung fehlgeschlagen");
    Framed::new(stream, FrameCodec::new())
}

async fn empfangen(client: &mut Client) -> ControlMessage {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("Keine Nachricht innerhalb von 5s")
        .expect("Verbindung geschlossen")
        .expect("Frame-Fehler")
}

/// Erwartet, dass in kurzer Zeit keine Nachricht ankommt
async fn keine_nachricht(client: &mut Client) {
    if let Ok(Some(Ok(n))) = tokio::time::timeout(Duration::from_millis(300), client.next()).await {
        panic!("Unerwartete Nachricht: {n:?}");
    }
}

async fn handshake(client: &mut Client, anfrage: HandshakeRequest) -> ControlMessage {
    client
        .send(ControlMessage::new(1, ControlPayload::Handshake(anfrage)))
        .await
        .unwrap();
    empfangen(client).await
}

async fn anmelden(addr: SocketAddr, token: &str) -> (Client, ConnectionId, Option<SessionIdentity>) {
    let mut client = verbinden(addr).await;
    let antwort = handshake(
        &mut client,
        HandshakeRequest {
            authorization: Some(format!("Bearer {token}")),
            forwarded_for: None,
        },
    )
    .await;
    match antwort.payload {
        ControlPayload::HandshakeAccepted(a) => (client, a.connection_id, a.identity),
        andere => panic!("HandshakeAccepted erwartet: {andere:?}"),
    }
}

async fn beitreten(client: &mut Client, pfad: &str) -> Vec<ConnectionId> {
    client.send(ControlMessage::room_join(2, pfad)).await.unwrap();
    let mitglieder = match empfangen(client).await.payload {
        ControlPayload::RoomJoined(r) => r.members.into_iter().map(|m| m.connection_id).collect(),
        andere => panic!("RoomJoined erwartet: {andere:?}"),
    };
    // Eigenes MemberJoined-Event
    assert!(matches!(
        empfangen(client).await.payload,
        ControlPayload::MemberJoined(_)
    ));
    mitglieder
}

fn fehler_code(nachricht: ControlMessage) -> ErrorCode {
    match nachricht.payload {
        ControlPayload::Error(e) => e.code,
        andere => panic!("Fehler erwartet: {andere:?}"),
    }
}

async fn warten_bis(mut bedingung: impl FnMut() -> bool) {
    for _ in 0..100 {
        if bedingung() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Bedingung nicht innerhalb von 2s erfuellt");
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handshake_registriert_verbindung() {
    let server = standard_server();
    let (_client, id, identity) = anmelden(server.addr, "irgendein-token").await;

    assert!(identity.is_none());
    assert!(server.state.registry.enthaelt(&id));
    assert_eq!(server.state.registry.anzahl(), 1);
}

#[tokio::test]
async fn handshake_ohne_credential_hinterlaesst_keinen_zustand() {
    let server = standard_server();

    for authorization in [None, Some(""), Some("Bearer"), Some("Bearer   ")] {
        let mut client = verbinden(server.addr).await;
        let antwort = handshake(
            &mut client,
            HandshakeRequest {
                authorization: authorization.map(String::from),
                forwarded_for: None,
            },
        )
        .await;
        assert_eq!(fehler_code(antwort), ErrorCode::AuthenticationFailed);

        // Server schliesst die Verbindung
        let ende = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Verbindung nicht geschlossen");
        assert!(ende.is_none() || matches!(ende, Some(Err(_))));
    }

    assert_eq!(server.state.registry.anzahl(), 0);
    assert_eq!(server.state.raeume.raum_anzahl(), 0);
}

#[tokio::test]
async fn erste_nachricht_muss_handshake_sein() {
    let server = standard_server();
    let mut client = verbinden(server.addr).await;

    client.send(ControlMessage::room_join(5, "/room-1")).await.unwrap();
    let antwort = empfangen(&mut client).await;
    assert_eq!(antwort.request_id, 5);
    assert_eq!(fehler_code(antwort), ErrorCode::NotAuthenticated);
    assert_eq!(server.state.raeume.raum_anzahl(), 0);
}

#[tokio::test]
async fn handshake_timeout() {
    let server = server_starten(
        SignalingConfig {
            handshake_timeout_sek: 1,
            ..Default::default()
        },
        AuthGate::praesenz(),
    );
    let mut client = verbinden(server.addr).await;

    let antwort = empfangen(&mut client).await;
    assert_eq!(fehler_code(antwort), ErrorCode::Timeout);
    assert_eq!(server.state.registry.anzahl(), 0);
}

#[tokio::test]
async fn weitergeleitete_adresse_wird_uebernommen() {
    let server = standard_server();
    let mut client = verbinden(server.addr).await;

    let antwort = handshake(
        &mut client,
        HandshakeRequest {
            authorization: Some("Bearer t".into()),
            forwarded_for: Some("203.0.113.9, 10.0.0.1".into()),
        },
    )
    .await;
    let id = match antwort.payload {
        ControlPayload::HandshakeAccepted(a) => a.connection_id,
        andere => panic!("HandshakeAccepted erwartet: {andere:?}"),
    };

    let verbindung = server.state.registry.verbindung(&id).unwrap();
    assert_eq!(verbindung.adresse, "203.0.113.9");
}

#[tokio::test]
async fn envelope_credential_liefert_stabile_identitaet() {
    let params = KdfParameter { runden: 1000 };
    let gate = AuthGate::neu(Arc::new(EnvelopeValidator::neu(
        KdfPool::neu(2, params),
        GEHEIMNIS,
    )));
    let server = server_starten(SignalingConfig::default(), gate);

    let token1 = issue_credential("alice@example.org", GEHEIMNIS, &params).unwrap();
    let (_c1, id1, identity1) = anmelden(server.addr, &token1).await;
    assert_eq!(identity1, Some(hash_identity("alice@example.org")));

    // Reconnect mit frischem Token: gleiche Identitaet, ersetzt den Eintrag
    let token2 = issue_credential("alice@example.org", GEHEIMNIS, &params).unwrap();
    let (_c2, id2, identity2) = anmelden(server.addr, &token2).await;
    assert_eq!(identity2, identity1);
    assert_ne!(id1, id2);
    assert_eq!(server.state.registry.anzahl(), 1);
    assert!(server.state.registry.enthaelt(&id2));

    // Kein gueltiger Envelope
    let mut client = verbinden(server.addr).await;
    let antwort = handshake(
        &mut client,
        HandshakeRequest {
            authorization: Some("Bearer kein-envelope".into()),
            forwarded_for: None,
        },
    )
    .await;
    assert_eq!(fehler_code(antwort), ErrorCode::AuthenticationFailed);
    assert_eq!(server.state.registry.anzahl(), 1);
}

#[tokio::test]
async fn max_clients_wird_durchgesetzt() {
    let server = server_starten(
        SignalingConfig {
            max_clients: 1,
            ..Default::default()
        },
        AuthGate::praesenz(),
    );
    let (_erster, _, _) = anmelden(server.addr, "a").await;

    let mut zweiter = verbinden(server.addr).await;
    assert_eq!(fehler_code(empfangen(&mut zweiter).await), ErrorCode::ServerFull);
    let ende = tokio::time::timeout(Duration::from_secs(5), zweiter.next())
        .await
        .expect("Verbindung nicht geschlossen");
    assert!(ende.is_none() || matches!(ende, Some(Err(_))));
    assert_eq!(server.state.registry.anzahl(), 1);
}

#[tokio::test]
async fn ausstehender_handshake_belegt_einen_platz() {
    let server = server_starten(
        SignalingConfig {
            max_clients: 1,
            ..Default::default()
        },
        AuthGate::praesenz(),
    );
    // Verbunden, aber noch kein Handshake
    let _wartend = verbinden(server.addr).await;
    let state = Arc::clone(&server.state);
    warten_bis(move || state.offene_verbindungen() == 1).await;

    let mut zweiter = verbinden(server.addr).await;
    assert_eq!(fehler_code(empfangen(&mut zweiter).await), ErrorCode::ServerFull);
    assert_eq!(server.state.registry.anzahl(), 0);
}

#[tokio::test]
async fn reconnect_trennt_alte_verbindung() {
    let params = KdfParameter { runden: 1000 };
    let gate = AuthGate::neu(Arc::new(EnvelopeValidator::neu(
        KdfPool::neu(2, params),
        GEHEIMNIS,
    )));
    let server = server_starten(
        SignalingConfig {
            max_clients: 2,
            ..Default::default()
        },
        gate,
    );

    let mut vorherige: Option<(Client, ConnectionId)> = None;
    for _ in 0..5 {
        let token = issue_credential("alice@example.org", GEHEIMNIS, &params).unwrap();
        let (mut client, id, _) = anmelden(server.addr, &token).await;

        // Die ersetzte Verbindung wird geschlossen, bevor sie aufgeraeumt ist
        if let Some((mut alt, alt_id)) = vorherige.take() {
            let ende = tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    match alt.next().await {
                        Some(Ok(_)) => continue,
                        andere => break andere,
                    }
                }
            })
            .await
            .expect("Alte Verbindung nicht geschlossen");
            assert!(ende.is_none() || matches!(ende, Some(Err(_))));
            assert!(!server.state.registry.enthaelt(&alt_id));
            assert_eq!(server.state.raeume.raum_von(&alt_id), None);
        }

        // Nur die aktuelle Verbindung ist im Raum
        assert_eq!(beitreten(&mut client, "/room-1").await, vec![id]);
        assert_eq!(server.state.registry.anzahl(), 1);
        vorherige = Some((client, id));
    }

    assert_eq!(server.state.raeume.mitglieder(RoomId(1)).len(), 1);
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn raum_broadcast_bleibt_im_raum() {
    let server = standard_server();
    let (mut a, id_a, _) = anmelden(server.addr, "a").await;
    let (mut b, _, _) = anmelden(server.addr, "b").await;
    let (mut c, id_c, _) = anmelden(server.addr, "c").await;

    assert_eq!(beitreten(&mut a, "/room-5").await, vec![id_a]);
    beitreten(&mut b, "/room-7").await;
    let mitglieder = beitreten(&mut c, "/room-5").await;
    assert_eq!(mitglieder, vec![id_a, id_c]);

    match empfangen(&mut a).await.payload {
        ControlPayload::MemberJoined(e) => {
            assert_eq!(e.room_id, RoomId(5));
            assert_eq!(e.member.connection_id, id_c);
        }
        andere => panic!("MemberJoined erwartet: {andere:?}"),
    }
    keine_nachricht(&mut b).await;
    assert_eq!(server.state.raeume.raum_anzahl(), 2);
}

#[tokio::test]
async fn ungueltiger_raum_pfad() {
    let server = standard_server();
    let (mut client, _, _) = anmelden(server.addr, "a").await;

    client.send(ControlMessage::room_join(9, "/room-x")).await.unwrap();
    let antwort = empfangen(&mut client).await;
    assert_eq!(antwort.request_id, 9);
    assert_eq!(fehler_code(antwort), ErrorCode::InvalidRequest);
    assert_eq!(server.state.raeume.raum_anzahl(), 0);
}

#[tokio::test]
async fn raum_verlassen_ohne_event() {
    let server = standard_server();
    let (mut a, id_a, _) = anmelden(server.addr, "a").await;
    let (mut b, _, _) = anmelden(server.addr, "b").await;

    beitreten(&mut a, "/room-3").await;
    beitreten(&mut b, "/room-3").await;
    empfangen(&mut a).await; // MemberJoined(b)

    a.send(ControlMessage::new(
        4,
        ControlPayload::RoomLeave(RoomLeaveRequest {
            path: "/room-3".into(),
        }),
    ))
    .await
    .unwrap();
    assert!(matches!(
        empfangen(&mut a).await.payload,
        ControlPayload::RoomLeft(_)
    ));

    keine_nachricht(&mut b).await;
    assert_eq!(server.state.raeume.raum_von(&id_a), None);
    assert_eq!(server.state.raeume.mitglieder(RoomId(3)).len(), 1);
}

#[tokio::test]
async fn trennen_raeumt_registry_und_raum_auf() {
    let server = standard_server();
    let (mut client, id, _) = anmelden(server.addr, "a").await;
    beitreten(&mut client, "/room-11").await;
    assert_eq!(server.state.raeume.raum_anzahl(), 1);

    drop(client);

    let state = Arc::clone(&server.state);
    warten_bis(move || state.registry.anzahl() == 0 && state.raeume.raum_anzahl() == 0).await;
    assert!(!server.state.registry.enthaelt(&id));
}

#[tokio::test]
async fn ping_pong() {
    let server = standard_server();
    let (mut client, _, _) = anmelden(server.addr, "a").await;

    client.send(ControlMessage::ping(42, 777)).await.unwrap();
    let antwort = empfangen(&mut client).await;
    assert_eq!(antwort.request_id, 42);
    match antwort.payload {
        ControlPayload::Pong(p) => assert_eq!(p.echo_timestamp_ms, 777),
        andere => panic!("Pong erwartet: {andere:?}"),
    }
}

#[tokio::test]
async fn shutdown_verabschiedet_clients() {
    let server = standard_server();
    let (mut client, _, _) = anmelden(server.addr, "a").await;

    server.shutdown.send(true).unwrap();
    let abschied = empfangen(&mut client).await;
    assert_eq!(abschied.request_id, 0);
    assert_eq!(fehler_code(abschied), ErrorCode::InternalError);
}
