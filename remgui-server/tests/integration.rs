//! Integration tests — full client/server session lifecycle over a
//! real TCP connection on localhost: frames, textures, input relay,
//! slot exhaustion and reverse connect.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use remgui_client::ClientContext;
use remgui_core::{
    CmdInput, CmdTexture, DisconnectReason, DrawData, DrawList, IndexList, Listener, ListCommand,
    MsgKind, RemError, TextureFormat, Transport, Vertex, encode_draw_frame, exchange_version,
    wire::encode_bare,
};
use remgui_server::config::ServerConfig;
use remgui_server::server::Server;

// ── Helpers ──────────────────────────────────────────────────────

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `cond` every few milliseconds until it holds, panicking after
/// the test timeout.
async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let result = tokio::time::timeout(TEST_TIMEOUT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

/// Server bound on an OS-assigned port, accept loop running.
async fn spawn_server(max_clients: usize) -> (Arc<Server>, std::net::SocketAddr) {
    let mut config = ServerConfig::default();
    config.network.max_clients = max_clients;
    let server = Arc::new(Server::new(config));

    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_server = Arc::clone(&server);
    tokio::spawn(async move { accept_server.serve(listener).await.unwrap() });
    (server, addr)
}

fn quad_frame(texture_id: u64) -> DrawData {
    let v = |x: f32, y: f32, u: f32, w: f32| Vertex {
        pos: [x, y],
        uv: [u, w],
        color: 0xFFFF_FFFF,
    };
    DrawData {
        display_area: [0.0, 0.0, 800.0, 600.0],
        mouse_cursor: 1,
        lists: vec![DrawList {
            vertices: vec![
                v(0.0, 0.0, 0.0, 0.0),
                v(64.0, 0.0, 1.0, 0.0),
                v(64.0, 64.0, 1.0, 1.0),
                v(0.0, 64.0, 0.0, 1.0),
            ],
            indices: IndexList::U16(vec![0, 1, 2, 0, 2, 3]),
            commands: vec![
                ListCommand::Draw {
                    texture_id,
                    index_count: 3,
                    clip_rect: [0.0, 0.0, 64.0, 64.0],
                },
                ListCommand::Draw {
                    texture_id,
                    index_count: 3,
                    clip_rect: [0.0, 0.0, 64.0, 64.0],
                },
            ],
        }],
    }
}

fn checker_texture(id: u64) -> CmdTexture {
    CmdTexture::create(id, 4, 4, TextureFormat::Rgba8, Bytes::from(vec![0x7F; 64])).unwrap()
}

// ── Full lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn full_session_lifecycle() {
    let (server, addr) = spawn_server(4).await;
    let table = server.slot_table();

    let ctx = Arc::new(ClientContext::new("painter"));
    ctx.queue_texture_async(checker_texture(42)).await.unwrap();
    ctx.submit_frame(&quad_frame(42)).unwrap();

    let session = tokio::spawn(remgui_client::connect(addr, Arc::clone(&ctx)));

    // Frame and texture arrive server-side.
    let slot = table.slot(0).unwrap();
    wait_for("client to connect", || slot.is_connected()).await;
    assert_eq!(slot.name(), "painter");
    wait_for("texture to arrive", || slot.texture(42).is_some()).await;
    wait_for("frame to arrive", || {
        slot.with_frame(|f| f.is_some())
    })
    .await;

    slot.with_frame(|f| {
        let frame = f.unwrap();
        assert_eq!(frame.vertex_count, 4);
        assert_eq!(frame.draw_count(), 2);
        assert_eq!(frame.draws[0].texture_id, 42);
        assert_eq!(frame.display_area, [0.0, 0.0, 800.0, 600.0]);
    });
    let tex = slot.texture(42).unwrap();
    assert_eq!((tex.width, tex.height), (4, 4));
    assert_eq!(tex.format, TextureFormat::Rgba8);
    assert!(slot.stats().frames_received >= 1);

    // Input flows back to the client.
    let mut input = CmdInput::default();
    input.screen_size = [800, 600];
    input.mouse_pos = [100, 50];
    input.push_chars(&[b'h' as u16, b'i' as u16]);
    slot.publish_input(input);

    let mut seen = None;
    wait_for("input to reach the client", || {
        if let Some(i) = ctx.take_input() {
            seen = Some(i);
        }
        seen.is_some()
    })
    .await;
    let seen = seen.unwrap();
    assert_eq!(seen.mouse_pos, [100, 50]);
    let mut chars = [0u16; 8];
    assert_eq!(ctx.read_chars(&mut chars), 2);
    assert_eq!(&chars[..2], &[b'h' as u16, b'i' as u16]);

    // Client disconnects; the slot frees up.
    ctx.request_disconnect();
    let reason = tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, DisconnectReason::LocalRequest);
    wait_for("slot to be released", || !slot.is_used()).await;
    assert_eq!(slot.texture_count(), 0);

    server.stop();
}

// ── Server-initiated disconnect ──────────────────────────────────

#[tokio::test]
async fn server_can_disconnect_a_client() {
    let (server, addr) = spawn_server(4).await;
    let table = server.slot_table();

    let ctx = Arc::new(ClientContext::new("painter"));
    let session = tokio::spawn(remgui_client::connect(addr, Arc::clone(&ctx)));

    let slot = table.slot(0).unwrap();
    wait_for("client to connect", || slot.is_connected()).await;

    slot.request_disconnect();
    let reason = tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, DisconnectReason::PeerRequest);
    assert!(!ctx.is_connected());
    wait_for("slot to be released", || !slot.is_used()).await;

    server.stop();
}

// ── Slot exhaustion ──────────────────────────────────────────────

#[tokio::test]
async fn connection_rejected_without_handshake_when_slots_full() {
    let (server, addr) = spawn_server(1).await;
    let table = server.slot_table();

    // First connection takes the only slot.
    let mut first = Transport::connect(addr).await.unwrap();
    exchange_version(&mut first, "first").await.unwrap();
    wait_for("slot to be taken", || table.used_count() == 1).await;

    // Second is closed before any Version command comes back.
    let mut second = Transport::connect(addr).await.unwrap();
    let result = tokio::time::timeout(TEST_TIMEOUT, exchange_version(&mut second, "second"))
        .await
        .unwrap();
    assert!(matches!(result, Err(RemError::Connection(_))));

    // Dropping the first frees its slot for a newcomer.
    drop(first);
    wait_for("slot to be released", || table.used_count() == 0).await;
    let mut third = Transport::connect(addr).await.unwrap();
    exchange_version(&mut third, "third").await.unwrap();

    server.stop();
}

// ── Reverse connect ──────────────────────────────────────────────

#[tokio::test]
async fn server_dials_a_listening_client() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let client_addr = listener.local_addr().unwrap();

    let ctx = Arc::new(ClientContext::new("walled-in"));
    let session = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { remgui_client::accept_from(&listener, ctx).await })
    };

    let server = Server::new(ServerConfig::default());
    let table = server.slot_table();
    server.connect_to_client(client_addr).await.unwrap();

    let slot = table.slot(0).unwrap();
    wait_for("session to become active", || {
        ctx.is_connected() && slot.is_connected()
    })
    .await;
    assert_eq!(slot.name(), "walled-in");

    ctx.submit_frame(&quad_frame(1)).unwrap();
    wait_for("frame to arrive", || slot.with_frame(|f| f.is_some())).await;

    ctx.request_disconnect();
    tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    wait_for("slot to be released", || !slot.is_used()).await;
}

// ── Shutdown of reverse-connect sessions ─────────────────────────

#[tokio::test]
async fn stopping_the_server_disconnects_a_reverse_session() {
    // No accept loop at all: a session dialed by the server must stay
    // up on its own and end only on an explicit stop.
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let client_addr = listener.local_addr().unwrap();

    let ctx = Arc::new(ClientContext::new("walled-in"));
    let session = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { remgui_client::accept_from(&listener, ctx).await })
    };

    let server = Server::new(ServerConfig::default());
    let table = server.slot_table();
    server.connect_to_client(client_addr).await.unwrap();

    let slot = table.slot(0).unwrap();
    wait_for("session to become active", || {
        ctx.is_connected() && slot.is_connected()
    })
    .await;

    // A few exchange rounds pass; the session must not tear itself
    // down.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ctx.is_connected());

    server.stop();
    let reason = tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, DisconnectReason::PeerRequest);
    wait_for("slot to be released", || !slot.is_used()).await;
}

// ── Hostile payloads ─────────────────────────────────────────────

#[tokio::test]
async fn corrupt_frame_offsets_free_the_slot() {
    let (server, addr) = spawn_server(1).await;
    let table = server.slot_table();

    let mut rogue = Transport::connect(addr).await.unwrap();
    exchange_version(&mut rogue, "rogue").await.unwrap();
    wait_for("slot to be taken", || table.used_count() == 1).await;

    // A frame whose vertex region claims to sit at the top of the
    // address space. The session must end with a typed error and hand
    // the only slot back to the pool.
    let mut wire = encode_draw_frame(&quad_frame(1)).unwrap().into_bytes();
    wire[40..48].copy_from_slice(&(u64::MAX - 7).to_le_bytes());
    rogue.send_exact(&wire).await.unwrap();
    let _ = rogue.send_exact(&encode_bare(MsgKind::Ping)).await;

    wait_for("slot to be released", || table.used_count() == 0).await;

    // The table is whole again: a well-behaved client still gets in.
    let ctx = Arc::new(ClientContext::new("painter"));
    let session = tokio::spawn(remgui_client::connect(addr, Arc::clone(&ctx)));
    let slot = table.slot(0).unwrap();
    wait_for("client to connect", || slot.is_connected()).await;

    ctx.request_disconnect();
    tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    server.stop();
}

// ── Texture replay across reconnect ──────────────────────────────

#[tokio::test]
async fn live_textures_replayed_on_reconnect() {
    let (server, addr) = spawn_server(2).await;
    let table = server.slot_table();

    let ctx = Arc::new(ClientContext::new("painter"));
    ctx.queue_texture_async(checker_texture(7)).await.unwrap();

    // First session delivers the texture.
    let session = tokio::spawn(remgui_client::connect(addr, Arc::clone(&ctx)));
    let slot = table.slot(0).unwrap();
    wait_for("texture to arrive", || slot.texture(7).is_some()).await;

    ctx.request_disconnect();
    tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    wait_for("slot to be released", || !slot.is_used()).await;

    // Second session: the texture was never queued again, yet the
    // server gets it back from the live set.
    let session = tokio::spawn(remgui_client::connect(addr, Arc::clone(&ctx)));
    let slot = table.slot(0).unwrap();
    wait_for("texture to be replayed", || slot.texture(7).is_some()).await;

    ctx.request_disconnect();
    tokio::time::timeout(TEST_TIMEOUT, session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    server.stop();
}
