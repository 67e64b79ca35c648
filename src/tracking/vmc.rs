//! VMC protocol source for sensor-based face tracking
//!
//! VMC (Virtual Motion Capture) is a protocol for transmitting motion capture
//! data over OSC. Depth-sensor phone trackers (iFacialMocap, VTube Studio
//! phone apps, etc.) send ARKit blendshapes and a head bone pose with it.

use glam::{Mat4, Quat, Vec3};
use rosc::{OscMessage, OscPacket, OscType};
use std::collections::HashMap;
use std::net::UdpSocket;

use super::{FaceTrackingSource, RawFaceSample};
use crate::config::VmcConfig;
use crate::error::TrackingError;

/// Accumulated VMC state between polls
#[derive(Debug, Clone, Default)]
pub struct VmcData {
    /// Blendshape values (0.0 - 1.0)
    pub blendshapes: HashMap<String, f32>,
    /// Head position (x, y, z)
    pub head_position: [f32; 3],
    /// Head rotation quaternion (x, y, z, w)
    pub head_rotation: [f32; 4],
    /// Whether a head bone pose has been received
    pub has_head: bool,
    /// Set when anything changed since the last poll
    pub dirty: bool,
}

impl VmcData {
    /// Build a raw sample from the accumulated state
    pub fn to_sample(&self) -> RawFaceSample {
        let transform = if self.has_head {
            let [x, y, z, w] = self.head_rotation;
            let rotation = Quat::from_xyzw(x, y, z, w);
            if rotation.length_squared() > f32::EPSILON {
                Mat4::from_rotation_translation(
                    rotation.normalize(),
                    Vec3::from_array(self.head_position),
                )
            } else {
                Mat4::from_translation(Vec3::from_array(self.head_position))
            }
        } else {
            Mat4::IDENTITY
        };

        RawFaceSample {
            blendshapes: self.blendshapes.clone(),
            transform,
        }
    }

    /// Apply one OSC packet (messages or nested bundles)
    pub fn apply_packet(&mut self, packet: OscPacket) {
        match packet {
            OscPacket::Message(msg) => self.apply_message(msg),
            OscPacket::Bundle(bundle) => {
                for packet in bundle.content {
                    self.apply_packet(packet);
                }
            }
        }
    }

    fn apply_message(&mut self, msg: OscMessage) {
        match msg.addr.as_str() {
            // /VMC/Ext/Blend/Val <name> <value>
            "/VMC/Ext/Blend/Val" => {
                if let (Some(OscType::String(name)), Some(value)) = (msg.args.first(), msg.args.get(1)) {
                    if let Some(value) = osc_float(value) {
                        self.blendshapes.insert(name.clone(), value);
                        self.dirty = true;
                    }
                }
            }

            // /VMC/Ext/Bone/Pos <name> <px> <py> <pz> <qx> <qy> <qz> <qw>
            "/VMC/Ext/Bone/Pos" => {
                if msg.args.len() < 8 {
                    return;
                }
                if let Some(OscType::String(name)) = msg.args.first() {
                    if name != "Head" {
                        return;
                    }
                    let floats: Vec<f32> = msg.args[1..8].iter().filter_map(osc_float).collect();
                    if floats.len() == 7 {
                        self.head_position = [floats[0], floats[1], floats[2]];
                        self.head_rotation = [floats[3], floats[4], floats[5], floats[6]];
                        self.has_head = true;
                        self.dirty = true;
                    }
                }
            }

            // Batch terminator / status messages carry nothing we need
            "/VMC/Ext/Blend/Apply" | "/VMC/Ext/OK" | "/VMC/Ext/T" | "/VMC/Ext/Root/Pos" => {}

            _ => {
                tracing::trace!("Unknown VMC message: {}", msg.addr);
            }
        }
    }
}

/// Decode one UDP datagram into an OSC packet
pub fn decode_packet(bytes: &[u8]) -> Result<OscPacket, TrackingError> {
    rosc::decoder::decode_udp(bytes)
        .map(|(_, packet)| packet)
        .map_err(|e| TrackingError::Parse(format!("OSC packet: {}", e)))
}

fn osc_float(arg: &OscType) -> Option<f32> {
    match arg {
        OscType::Float(f) => Some(*f),
        OscType::Double(d) => Some(*d as f32),
        OscType::Int(i) => Some(*i as f32),
        _ => None,
    }
}

/// VMC/OSC tracking source
pub struct VmcSource {
    config: VmcConfig,
    socket: Option<UdpSocket>,
    data: VmcData,
}

impl VmcSource {
    /// Create a new VMC source (does not bind yet)
    pub fn new(config: &VmcConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            data: VmcData::default(),
        }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.config.listen_address, self.config.receiver_port)
    }
}

impl FaceTrackingSource for VmcSource {
    fn name(&self) -> &'static str {
        "vmc"
    }

    fn is_available(&self) -> bool {
        if self.socket.is_some() {
            return true;
        }
        // The receiver port must be free to bind
        UdpSocket::bind(self.address()).is_ok()
    }

    fn requires_permission(&self) -> bool {
        false
    }

    fn start(&mut self) -> Result<(), TrackingError> {
        if self.socket.is_some() {
            return Ok(());
        }

        let addr = self.address();
        let socket = UdpSocket::bind(&addr)
            .map_err(|e| TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e)))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TrackingError::Receiver(format!("Failed to set non-blocking: {}", e)))?;

        tracing::info!("VMC receiver listening on {}", addr);
        self.data = VmcData::default();
        self.socket = Some(socket);
        Ok(())
    }

    fn poll_sample(&mut self) -> Result<Option<RawFaceSample>, TrackingError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut buf = [0u8; 65536];

        loop {
            match socket.recv(&mut buf) {
                Ok(0) => break,
                Ok(size) => match decode_packet(&buf[..size]) {
                    Ok(packet) => self.data.apply_packet(packet),
                    Err(e) => tracing::debug!("Dropping packet: {}", e),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(TrackingError::Receiver(format!("Receive error: {}", e)));
                }
            }
        }

        if !self.data.dirty {
            return Ok(None);
        }
        self.data.dirty = false;
        Ok(Some(self.data.to_sample()))
    }

    fn stop(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!("VMC receiver stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::features::head_angles;
    use rosc::{encoder, OscBundle, OscTime};

    fn blend(name: &str, value: f32) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: "/VMC/Ext/Blend/Val".to_string(),
            args: vec![OscType::String(name.to_string()), OscType::Float(value)],
        })
    }

    fn head(q: Quat) -> OscPacket {
        OscPacket::Message(OscMessage {
            addr: "/VMC/Ext/Bone/Pos".to_string(),
            args: vec![
                OscType::String("Head".to_string()),
                OscType::Float(0.0),
                OscType::Float(1.5),
                OscType::Float(0.0),
                OscType::Float(q.x),
                OscType::Float(q.y),
                OscType::Float(q.z),
                OscType::Float(q.w),
            ],
        })
    }

    #[test]
    fn test_vmc_data_default() {
        let data = VmcData::default();
        assert!(!data.dirty);
        assert!(data.blendshapes.is_empty());
        assert_eq!(data.to_sample().transform, Mat4::IDENTITY);
    }

    #[test]
    fn test_blend_values_accumulate() {
        let mut data = VmcData::default();
        data.apply_packet(blend("jawOpen", 0.4));
        data.apply_packet(blend("eyeBlinkLeft", 0.9));
        data.apply_packet(blend("jawOpen", 0.6));
        assert!(data.dirty);
        assert!((data.blendshapes["jawOpen"] - 0.6).abs() < 1e-6);
        assert_eq!(data.blendshapes.len(), 2);
    }

    #[test]
    fn test_bundle_with_head_pose() {
        let q = Quat::from_rotation_y(20f32.to_radians());
        let mut data = VmcData::default();
        data.apply_packet(OscPacket::Bundle(OscBundle {
            timetag: OscTime::from((0, 1)),
            content: vec![blend("jawOpen", 0.2), head(q)],
        }));

        let sample = data.to_sample();
        let angles = head_angles(&sample.transform);
        assert!((angles.yaw - 20.0).abs() < 1e-3);
        assert!((sample.transform.w_axis.y - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_undecodable_datagram_is_parse_error() {
        let err = decode_packet(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, TrackingError::Parse(_)));

        let bytes = encoder::encode(&blend("jawOpen", 0.3)).unwrap();
        assert!(matches!(decode_packet(&bytes), Ok(OscPacket::Message(_))));
    }

    #[test]
    fn test_non_head_bones_ignored() {
        let mut data = VmcData::default();
        data.apply_packet(OscPacket::Message(OscMessage {
            addr: "/VMC/Ext/Bone/Pos".to_string(),
            args: vec![
                OscType::String("Spine".to_string()),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(0.0),
                OscType::Float(1.0),
            ],
        }));
        assert!(!data.has_head);
        assert!(!data.dirty);
    }

    #[test]
    fn test_source_receives_over_udp() {
        let config = VmcConfig {
            listen_address: "127.0.0.1".to_string(),
            receiver_port: 0,
        };
        let mut source = VmcSource::new(&config);
        source.start().unwrap();
        assert!(source.is_available());

        let addr = source.socket.as_ref().unwrap().local_addr().unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let bytes = encoder::encode(&blend("jawOpen", 0.7)).unwrap();
        sender.send_to(&bytes, addr).unwrap();

        let mut sample = None;
        for _ in 0..50 {
            sample = source.poll_sample().unwrap();
            if sample.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let sample = sample.expect("no VMC sample");
        assert!((sample.blendshapes["jawOpen"] - 0.7).abs() < 1e-6);

        // Nothing new since the last poll
        assert!(source.poll_sample().unwrap().is_none());
        source.stop();
    }
}
