//! Hand-built Standard MIDI File bytes for tests.

pub fn vlq(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    bytes
}

pub fn track_chunk(body: &[u8]) -> Vec<u8> {
    let mut chunk = b"MTrk".to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_be_bytes());
    chunk.extend_from_slice(body);
    chunk
}

/// Format 1 file with the given track bodies.
pub fn smf_bytes(ticks_per_quarter: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = b"MThd".to_vec();
    bytes.extend_from_slice(&6u32.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&ticks_per_quarter.to_be_bytes());
    for body in tracks {
        bytes.extend_from_slice(&track_chunk(body));
    }
    bytes
}

/// Writes explicit status bytes for every event, channel 0.
#[derive(Default)]
pub struct TrackBuilder {
    body: Vec<u8>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note_on(mut self, delta: u32, pitch: u8, velocity: u8) -> Self {
        self.body.extend(vlq(delta));
        self.body.extend_from_slice(&[0x90, pitch, velocity]);
        self
    }

    pub fn note_off(mut self, delta: u32, pitch: u8) -> Self {
        self.body.extend(vlq(delta));
        self.body.extend_from_slice(&[0x80, pitch, 0]);
        self
    }

    pub fn control(mut self, delta: u32, controller: u8, value: u8) -> Self {
        self.body.extend(vlq(delta));
        self.body.extend_from_slice(&[0xB0, controller, value]);
        self
    }

    pub fn tempo(mut self, delta: u32, microseconds_per_beat: u32) -> Self {
        self.body.extend(vlq(delta));
        self.body.extend_from_slice(&[0xFF, 0x51, 0x03]);
        self.body
            .extend_from_slice(&microseconds_per_beat.to_be_bytes()[1..]);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.body.extend(vlq(0));
        self.body.extend_from_slice(&[0xFF, 0x03]);
        self.body.extend(vlq(name.len() as u32));
        self.body.extend_from_slice(name.as_bytes());
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        self.body
    }
}
