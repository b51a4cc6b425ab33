//! Integration tests — handshake plus a full command round over a
//! real TCP connection, using only this crate's public API.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use remgui_core::{
    CmdInput, CmdTexture, DisconnectReason, DrawData, DrawFrame, DrawList, IndexList, Listener,
    ListCommand, MsgHeader, MsgKind, RemError, SessionDelegate, SessionPhase, TextureFormat,
    Transport, Vertex, encode_draw_frame, exchange_version, run_session, wire,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Delegates ────────────────────────────────────────────────────

/// Sends one texture and one frame, then disconnects.
struct OneShotProducer {
    texture: Option<CmdTexture>,
    frame: Option<DrawData>,
}

#[async_trait]
impl SessionDelegate for OneShotProducer {
    async fn pump_outgoing(&mut self, transport: &mut Transport) -> Result<(), RemError> {
        if let Some(texture) = self.texture.take() {
            transport.send_exact(&texture.encode()).await?;
        }
        if let Some(frame) = self.frame.take() {
            let encoded = encode_draw_frame(&frame)?;
            transport.send_exact(encoded.as_bytes()).await?;
        }
        transport.send_exact(&wire::encode_bare(MsgKind::Ping)).await?;
        Ok(())
    }

    async fn handle_payload(&mut self, _header: MsgHeader, _blob: Bytes) -> Result<(), RemError> {
        Ok(())
    }

    fn disconnect_requested(&self) -> bool {
        self.texture.is_none() && self.frame.is_none()
    }

    fn pace(&self) -> Duration {
        Duration::from_millis(1)
    }
}

/// Collects whatever the peer sends.
#[derive(Default)]
struct Collector {
    textures: Vec<CmdTexture>,
    frames: Vec<DrawFrame>,
}

#[async_trait]
impl SessionDelegate for Collector {
    async fn pump_outgoing(&mut self, transport: &mut Transport) -> Result<(), RemError> {
        transport.send_exact(&wire::encode_bare(MsgKind::Ping)).await?;
        Ok(())
    }

    async fn handle_payload(&mut self, header: MsgHeader, blob: Bytes) -> Result<(), RemError> {
        match header.kind {
            MsgKind::Texture => self.textures.push(CmdTexture::decode(blob)?),
            MsgKind::DrawFrame => self.frames.push(DrawFrame::decode(blob)?),
            _ => return Err(RemError::ProtocolViolation("unexpected command")),
        }
        Ok(())
    }

    fn disconnect_requested(&self) -> bool {
        false
    }

    fn pace(&self) -> Duration {
        Duration::from_millis(1)
    }
}

fn sample_frame() -> DrawData {
    let v = |x: f32, y: f32| Vertex {
        pos: [x, y],
        uv: [0.5, 0.5],
        color: 0xFF10_2030,
    };
    DrawData {
        display_area: [0.0, 0.0, 640.0, 480.0],
        mouse_cursor: 0,
        lists: vec![DrawList {
            vertices: vec![v(10.0, 10.0), v(20.0, 10.0), v(20.0, 20.0)],
            indices: IndexList::U16(vec![0, 1, 2]),
            commands: vec![ListCommand::Draw {
                texture_id: 3,
                index_count: 3,
                clip_rect: [0.0, 0.0, 640.0, 480.0],
            }],
        }],
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn texture_and_frame_cross_a_real_socket() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let receiver = tokio::spawn(async move {
        let mut t = listener.accept().await.unwrap();
        exchange_version(&mut t, "receiver").await.unwrap();
        let mut sp = SessionPhase::Handshaking;
        sp.complete_handshake().unwrap();
        let mut collector = Collector::default();
        let reason = run_session(&mut t, &mut sp, &mut collector).await.unwrap();
        (reason, collector)
    });

    let sender = async {
        let mut t = Transport::connect(addr).await.unwrap();
        exchange_version(&mut t, "sender").await.unwrap();
        let mut sp = SessionPhase::Handshaking;
        sp.complete_handshake().unwrap();
        let mut producer = OneShotProducer {
            texture: Some(
                CmdTexture::create(3, 2, 2, TextureFormat::A8, Bytes::from_static(&[9; 4]))
                    .unwrap(),
            ),
            frame: Some(sample_frame()),
        };
        run_session(&mut t, &mut sp, &mut producer).await.unwrap()
    };

    let (sent, received) = tokio::time::timeout(TEST_TIMEOUT, async {
        let (s, r) = tokio::join!(sender, receiver);
        (s, r.unwrap())
    })
    .await
    .unwrap();

    assert_eq!(sent, DisconnectReason::LocalRequest);
    assert_eq!(received.0, DisconnectReason::PeerRequest);

    let collector = received.1;
    assert_eq!(collector.textures.len(), 1);
    assert_eq!(collector.textures[0].texture_id, 3);
    assert_eq!(&collector.textures[0].pixels[..], &[9; 4]);

    assert_eq!(collector.frames.len(), 1);
    let frame = &collector.frames[0];
    assert_eq!(frame.vertex_count, 3);
    assert_eq!(frame.draw_count(), 1);
    assert_eq!(frame.draws[0].texture_id, 3);
    // Positions survive quantization to within one step of 1/8 unit.
    assert!((frame.vertices[0].pos[0] - 10.0).abs() <= 0.125);
    assert!((frame.vertices[2].pos[1] - 20.0).abs() <= 0.125);
    assert_eq!(frame.vertices[0].color, 0xFF10_2030);
}

#[tokio::test]
async fn input_snapshot_roundtrip_over_socket() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut t = listener.accept().await.unwrap();
        let mut input = CmdInput::default();
        input.screen_size = [1920, 1080];
        input.mouse_pos = [-5, 40];
        input.wheel_vert = 1.5;
        input.set_key_down(65, true);
        input.push_chars(&[0x263A]);
        t.send_exact(&input.encode()).await.unwrap();
    });

    let mut client = Transport::connect(addr).await.unwrap();
    let (header, blob) = tokio::time::timeout(TEST_TIMEOUT, client.receive_message())
        .await
        .unwrap()
        .unwrap();
    server.await.unwrap();

    assert_eq!(header.kind, MsgKind::Input);
    let input = CmdInput::decode(&blob).unwrap();
    assert_eq!(input.screen_size, [1920, 1080]);
    assert_eq!(input.mouse_pos, [-5, 40]);
    assert_eq!(input.wheel_vert, 1.5);
    assert!(input.is_key_down(65));
    assert!(!input.is_key_down(66));
    assert_eq!(input.chars(), &[0x263A]);
}

#[tokio::test]
async fn byte_counters_track_traffic() {
    let listener = Listener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let mut t = listener.accept().await.unwrap();
        t.receive_message().await.unwrap();
        t.bytes_received()
    });

    let mut client = Transport::connect(addr).await.unwrap();
    client
        .send_exact(&CmdInput::default().encode())
        .await
        .unwrap();

    assert_eq!(client.bytes_sent(), 192);
    assert_eq!(server.await.unwrap(), 192);
}
