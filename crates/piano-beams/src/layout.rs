//! 88-key piano layout
//!
//! The keyboard is assembled from three section templates:
//!
//! ```text
//!  Start   CE        FB              (CE FB) x 7 ...   Tail
//!  W B W | W B W B W | W B W B W B W | ...             | W
//!  A0  B0  C1    E1    F1          B1                    C8
//! ```
//!
//! Each section hands out key ids from a [`LayoutContext`] in strict
//! left-to-right order, so the resulting ids line up with MIDI note numbers
//! (21 = A0 through 108 = C8).

/// Id of the leftmost key on an 88-key keyboard (A0)
pub const FIRST_KEY_ID: u8 = 21;

/// Id of the rightmost key on an 88-key keyboard (C8)
pub const LAST_KEY_ID: u8 = 108;

/// Total number of keys
pub const KEY_COUNT: usize = 88;

/// Number of white keys
pub const WHITE_KEY_COUNT: usize = 52;

/// Number of (CE, FB) section pairs between the start section and the tail
pub const OCTAVE_GROUPS: usize = 7;

/// Black key width as a fraction of the white key width
const BLACK_WIDTH_RATIO: f32 = 52.0 / 80.0;

/// White or black key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    White,
    Black,
}

/// Section template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Partial opening group: 2 white keys, 1 black key (A0 A#0 B0)
    Start,
    /// The C-D-E white run: 3 white keys, 2 black keys
    Ce,
    /// The F-G-A-B white run: 4 white keys, 3 black keys
    Fb,
    /// Single trailing white key (C8)
    Tail,
}

impl SectionKind {
    /// Number of white keys in this template
    pub fn white_keys(self) -> usize {
        match self {
            SectionKind::Start => 2,
            SectionKind::Ce => 3,
            SectionKind::Fb => 4,
            SectionKind::Tail => 1,
        }
    }

    /// Number of black keys in this template (one between each white pair)
    pub fn black_keys(self) -> usize {
        self.white_keys() - 1
    }

    /// Instantiate the template, allocating ids from `ctx`
    pub fn build(self, section: usize, ctx: &mut LayoutContext) -> Vec<Key> {
        let whites = self.white_keys();
        let mut keys = Vec::with_capacity(whites + self.black_keys());
        for slot in 0..whites {
            let kinds: &[KeyKind] = if slot + 1 < whites {
                &[KeyKind::White, KeyKind::Black]
            } else {
                &[KeyKind::White]
            };
            for &kind in kinds {
                // Stops short once the id range is used up
                match ctx.allocate(kind, section, slot) {
                    Some(key) => keys.push(key),
                    None => return keys,
                }
            }
        }
        keys
    }
}

/// A single key descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Key id (MIDI note number)
    pub id: u8,
    /// White or black
    pub kind: KeyKind,
    /// Index of the section this key belongs to
    pub section: usize,
    /// White slot within the section. For a black key this is the slot of
    /// the white key to its left.
    pub section_slot: usize,
    /// Index among all white keys. For a black key this is the index of the
    /// white key to its left.
    pub white_index: usize,
}

impl Key {
    pub fn is_black(&self) -> bool {
        self.kind == KeyKind::Black
    }

    pub fn is_white(&self) -> bool {
        self.kind == KeyKind::White
    }

    /// Note name including octave, e.g. "A0", "C#4"
    pub fn note_name(&self) -> String {
        note_name(self.id)
    }

    /// Index of the first white key of this key's section
    pub fn section_origin(&self) -> usize {
        self.white_index - self.section_slot
    }
}

/// Key id allocation state for one layout build
///
/// Threaded explicitly through the section builders; after a section has
/// been built the context holds the next available id. Once id 255 has been
/// handed out the context is exhausted and allocates nothing more.
#[derive(Debug, Clone)]
pub struct LayoutContext {
    next_id: Option<u8>,
    white_count: usize,
}

impl Default for LayoutContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutContext {
    /// Start allocating at [`FIRST_KEY_ID`]
    pub fn new() -> Self {
        Self::starting_at(FIRST_KEY_ID)
    }

    /// Start allocating at an arbitrary id
    pub fn starting_at(id: u8) -> Self {
        Self {
            next_id: Some(id),
            white_count: 0,
        }
    }

    /// Return the next id and advance, or None once exhausted
    pub fn next_id(&mut self) -> Option<u8> {
        let id = self.next_id?;
        self.next_id = id.checked_add(1);
        Some(id)
    }

    /// The id the next allocation will return
    pub fn peek_id(&self) -> Option<u8> {
        self.next_id
    }

    /// Number of white keys allocated so far
    pub fn white_count(&self) -> usize {
        self.white_count
    }

    fn allocate(&mut self, kind: KeyKind, section: usize, section_slot: usize) -> Option<Key> {
        let id = self.next_id()?;
        let white_index = match kind {
            KeyKind::White => {
                self.white_count += 1;
                self.white_count - 1
            }
            KeyKind::Black => self.white_count - 1,
        };
        Some(Key {
            id,
            kind,
            section,
            section_slot,
            white_index,
        })
    }
}

/// The complete, immutable key layout
#[derive(Debug, Clone)]
pub struct Layout {
    keys: Vec<Key>,
    sections: Vec<SectionKind>,
}

impl Default for Layout {
    fn default() -> Self {
        Self::generate()
    }
}

impl Layout {
    /// Generate the 88-key layout: Start, (CE, FB) x 7, Tail
    pub fn generate() -> Self {
        let mut sections = Vec::with_capacity(2 + OCTAVE_GROUPS * 2);
        sections.push(SectionKind::Start);
        for _ in 0..OCTAVE_GROUPS {
            sections.push(SectionKind::Ce);
            sections.push(SectionKind::Fb);
        }
        sections.push(SectionKind::Tail);

        let mut ctx = LayoutContext::new();
        let mut keys = Vec::with_capacity(KEY_COUNT);
        for (index, section) in sections.iter().enumerate() {
            keys.extend(section.build(index, &mut ctx));
        }

        Self { keys, sections }
    }

    /// All keys in left-to-right order
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Section templates in left-to-right order
    pub fn sections(&self) -> &[SectionKind] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Look up a key by id
    pub fn get(&self, id: u8) -> Option<&Key> {
        let first = self.keys.first()?.id;
        let index = id.checked_sub(first)? as usize;
        self.keys.get(index).filter(|k| k.id == id)
    }

    /// Index of a key id in [`Layout::keys`]
    pub fn index_of(&self, id: u8) -> Option<usize> {
        let first = self.keys.first()?.id;
        let index = id.checked_sub(first)? as usize;
        (index < self.keys.len()).then_some(index)
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.is_white())
    }

    pub fn black_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.is_black())
    }

    pub fn white_count(&self) -> usize {
        self.white_keys().count()
    }
}

/// Horizontal key geometry for a given white key width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyGeometry {
    pub white_width: f32,
    pub black_width: f32,
}

impl KeyGeometry {
    /// Geometry for a white key width; black keys are 52/80 of it
    pub fn new(white_width: f32) -> Self {
        Self {
            white_width,
            black_width: white_width * BLACK_WIDTH_RATIO,
        }
    }

    /// Geometry that fits all white keys into `total_width`
    pub fn fit(total_width: f32) -> Self {
        Self::new(total_width / WHITE_KEY_COUNT as f32)
    }

    /// Offset of a black key from the left edge of its section
    pub fn black_key_offset(&self, section_slot: usize) -> f32 {
        (section_slot as f32 + 1.0) * self.white_width - self.black_width / 2.0
    }

    /// Left edge and width of a key, relative to the keyboard's left edge
    pub fn span(&self, key: &Key) -> (f32, f32) {
        match key.kind {
            KeyKind::White => (key.white_index as f32 * self.white_width, self.white_width),
            KeyKind::Black => {
                let section_left = key.section_origin() as f32 * self.white_width;
                (section_left + self.black_key_offset(key.section_slot), self.black_width)
            }
        }
    }
}

/// Pitch class name of a MIDI note number ("C", "C#", ...)
pub fn pitch_class_name(note: u8) -> &'static str {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    NAMES[(note % 12) as usize]
}

/// Convert a MIDI note number to a note name
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", pitch_class_name(note), octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_black_pitch(id: u8) -> bool {
        matches!(id % 12, 1 | 3 | 6 | 8 | 10)
    }

    #[test]
    fn test_ids_cover_midi_range() {
        let layout = Layout::generate();
        let ids: Vec<u8> = layout.keys().iter().map(|k| k.id).collect();
        let expected: Vec<u8> = (FIRST_KEY_ID..=LAST_KEY_ID).collect();
        assert_eq!(ids, expected);
        assert_eq!(layout.len(), KEY_COUNT);
        assert_eq!(layout.white_count(), WHITE_KEY_COUNT);
        assert_eq!(layout.black_keys().count(), 36);
    }

    #[test]
    fn test_white_black_pattern_matches_midi() {
        let layout = Layout::generate();
        for key in layout.keys() {
            assert_eq!(key.is_black(), is_black_pitch(key.id), "key {}", key.id);
        }
        assert!(layout.get(21).unwrap().is_white());
        assert!(layout.get(22).unwrap().is_black());
        assert!(layout.get(23).unwrap().is_white());
        assert!(layout.get(60).unwrap().is_white());
        assert!(layout.get(61).unwrap().is_black());
        assert!(layout.get(108).unwrap().is_white());
    }

    #[test]
    fn test_sections() {
        let layout = Layout::generate();
        let sections = layout.sections();
        assert_eq!(sections.len(), 16);
        assert_eq!(sections[0], SectionKind::Start);
        assert_eq!(sections[1], SectionKind::Ce);
        assert_eq!(sections[2], SectionKind::Fb);
        assert_eq!(*sections.last().unwrap(), SectionKind::Tail);
    }

    #[test]
    fn test_no_black_key_at_section_boundary() {
        let layout = Layout::generate();
        let keys = layout.keys();
        for pair in keys.windows(2) {
            if pair[0].section != pair[1].section {
                assert!(pair[0].is_white(), "section ends with black key {}", pair[0].id);
                assert!(pair[1].is_white(), "section starts with black key {}", pair[1].id);
            }
        }
    }

    #[test]
    fn test_black_keys_have_white_neighbors() {
        let layout = Layout::generate();
        for key in layout.black_keys() {
            let left = layout.get(key.id - 1).unwrap();
            let right = layout.get(key.id + 1).unwrap();
            assert!(left.is_white());
            assert!(right.is_white());
            assert_eq!(left.section, key.section);
            assert_eq!(right.section, key.section);
            assert_eq!(left.white_index, key.white_index);
            assert_eq!(right.white_index, key.white_index + 1);
        }
    }

    #[test]
    fn test_context_threading() {
        let mut ctx = LayoutContext::starting_at(60);
        let ce = SectionKind::Ce.build(0, &mut ctx);
        assert_eq!(ce.iter().map(|k| k.id).collect::<Vec<_>>(), vec![60, 61, 62, 63, 64]);
        assert_eq!(ctx.peek_id(), Some(65));
        assert_eq!(ctx.white_count(), 3);

        let fb = SectionKind::Fb.build(1, &mut ctx);
        assert_eq!(fb.len(), 7);
        assert_eq!(fb[0].id, 65);
        assert_eq!(fb[0].white_index, 3);
        assert_eq!(ctx.peek_id(), Some(72));
    }

    #[test]
    fn test_context_stops_at_last_id() {
        let mut ctx = LayoutContext::starting_at(250);
        let fb = SectionKind::Fb.build(0, &mut ctx);
        assert_eq!(fb.iter().map(|k| k.id).collect::<Vec<_>>(), vec![250, 251, 252, 253, 254, 255]);
        assert_eq!(ctx.peek_id(), None);
        assert_eq!(ctx.next_id(), None);
        assert!(SectionKind::Ce.build(1, &mut ctx).is_empty());
    }

    #[test]
    fn test_lookup() {
        let layout = Layout::generate();
        assert!(layout.get(20).is_none());
        assert!(layout.get(109).is_none());
        assert_eq!(layout.index_of(21), Some(0));
        assert_eq!(layout.index_of(108), Some(87));
        assert_eq!(layout.index_of(0), None);
    }

    #[test]
    fn test_black_key_geometry() {
        let geometry = KeyGeometry::new(8.0);
        assert!((geometry.black_width - 5.2).abs() < 1e-4);
        // Straddles the boundary between slot 0 and slot 1
        assert!((geometry.black_key_offset(0) - 5.4).abs() < 1e-4);
        assert!((geometry.black_key_offset(2) - 21.4).abs() < 1e-4);

        let layout = Layout::generate();
        // C#4 sits between C4 and D4
        let (c4_left, c4_width) = geometry.span(layout.get(60).unwrap());
        let (cs4_left, cs4_width) = geometry.span(layout.get(61).unwrap());
        assert!(cs4_left > c4_left);
        assert!(cs4_left < c4_left + c4_width);
        assert!(cs4_left + cs4_width > c4_left + c4_width);
    }

    #[test]
    fn test_fit() {
        let geometry = KeyGeometry::fit(104.0);
        assert_eq!(geometry.white_width, 2.0);
        let layout = Layout::generate();
        let (left, width) = geometry.span(layout.get(108).unwrap());
        assert_eq!(left + width, 104.0);
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(21), "A0");
        assert_eq!(note_name(22), "A#0");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(108), "C8");
        assert_eq!(pitch_class_name(61), "C#");
    }
}
