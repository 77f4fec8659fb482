use crate::block::RawGroup;

/// Generates the group sequence of a simple station
///
/// The schedule repeats `0A 0A 2A`: type 0A carries the programme service
/// name two characters at a time, type 2A carries RadioText four characters
/// at a time. Segment addresses advance on every group, so consecutive groups
/// differ the way broadcast groups do.
#[derive(Debug, Clone)]
pub struct GroupSource {
    pi: u16,
    pty: u8,
    ps: [u8; 8],
    radiotext: Vec<u8>,
    ps_segment: usize,
    rt_segment: usize,
    counter: usize,
    version_b: bool,
}

impl GroupSource {
    pub fn new(pi: u16) -> Self {
        Self {
            pi,
            pty: 10,
            ps: *b"RUSTYRDS",
            radiotext: b"NOW PLAYING: SYNDROMES AND OFFSET WORDS ON 87.6 MHZ ".to_vec(),
            ps_segment: 0,
            rt_segment: 0,
            counter: 0,
            version_b: false,
        }
    }

    /// Emit 0B groups (offset C', PI repeated in block C) instead of 0A
    pub fn version_b(mut self, enabled: bool) -> Self {
        self.version_b = enabled;
        self
    }

    pub fn ps(mut self, name: &[u8; 8]) -> Self {
        self.ps = *name;
        self
    }

    pub fn pi(&self) -> u16 {
        self.pi
    }

    /// Data words of the next group and whether block C uses offset C'
    pub fn next_words(&mut self) -> ([u16; 4], bool) {
        let slot = self.counter % 3;
        self.counter += 1;
        if slot < 2 {
            self.next_ps()
        } else {
            (self.next_radiotext(), false)
        }
    }

    pub fn next_group(&mut self) -> RawGroup {
        let (words, c_prime) = self.next_words();
        RawGroup::encode(words, c_prime)
    }

    fn block_b(&self, group_type: u16, version_b: bool, low: u16) -> u16 {
        (group_type << 12) | ((version_b as u16) << 11) | (1 << 10) | ((self.pty as u16) << 5) | low
    }

    fn next_ps(&mut self) -> ([u16; 4], bool) {
        let seg = self.ps_segment;
        self.ps_segment = (seg + 1) % 4;

        // TA off, music, DI bit for this segment
        let di = (0b0101 >> (3 - seg)) & 1;
        let b = self.block_b(0, self.version_b, (1 << 3) | ((di as u16) << 2) | seg as u16);
        let c = if self.version_b { self.pi } else { 0xE0CD };
        let d = u16::from_be_bytes([self.ps[2 * seg], self.ps[2 * seg + 1]]);
        ([self.pi, b, c, d], self.version_b)
    }

    fn next_radiotext(&mut self) -> [u16; 4] {
        let segments = self.radiotext.len().div_ceil(4).min(16);
        let seg = self.rt_segment;
        self.rt_segment = (seg + 1) % segments;

        let text = |i: usize| *self.radiotext.get(4 * seg + i).unwrap_or(&b' ');
        let b = self.block_b(2, false, seg as u16);
        let c = u16::from_be_bytes([text(0), text(1)]);
        let d = u16::from_be_bytes([text(2), text(3)]);
        [self.pi, b, c, d]
    }
}

impl Iterator for GroupSource {
    type Item = RawGroup;

    fn next(&mut self) -> Option<RawGroup> {
        Some(self.next_group())
    }
}
