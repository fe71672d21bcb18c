use std::fmt;

/// Which of the `\A` and `\G` anchors can match for a scan.
/// We don't want to enable \A or \G everywhere, it's context dependent: `\A` only matches on
/// the first line and `\G` only at the anchor position.
#[derive(Copy, Clone, PartialEq, Hash, Eq)]
pub enum AnchorActive {
    /// Only \A is active
    A,
    /// Only \G is active
    G,
    /// Both \A and \G are active
    AG,
    /// Neither \A nor \G are active
    None,
}

impl AnchorActive {
    pub const ALL: [AnchorActive; 4] = [
        AnchorActive::None,
        AnchorActive::A,
        AnchorActive::G,
        AnchorActive::AG,
    ];

    pub fn new(is_first_line: bool, anchor_position: Option<usize>, current_pos: usize) -> Self {
        let g_active = anchor_position == Some(current_pos);
        Self::from_flags(is_first_line, g_active)
    }

    pub fn from_flags(allow_a: bool, allow_g: bool) -> Self {
        match (allow_a, allow_g) {
            (true, true) => AnchorActive::AG,
            (true, false) => AnchorActive::A,
            (false, true) => AnchorActive::G,
            (false, false) => AnchorActive::None,
        }
    }

    pub fn allows_a(self) -> bool {
        matches!(self, AnchorActive::A | AnchorActive::AG)
    }

    pub fn allows_g(self) -> bool {
        matches!(self, AnchorActive::G | AnchorActive::AG)
    }

    /// The same anchors with `\G` enabled
    pub fn with_g(self) -> Self {
        Self::from_flags(self.allows_a(), true)
    }

    /// Position in [`AnchorActive::ALL`], used to index per-variant caches
    pub(crate) fn index(self) -> usize {
        match self {
            AnchorActive::None => 0,
            AnchorActive::A => 1,
            AnchorActive::G => 2,
            AnchorActive::AG => 3,
        }
    }
}

impl fmt::Debug for AnchorActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnchorActive::A => "allow_A=true, allow_G=false",
            AnchorActive::G => "allow_A=false, allow_G=true",
            AnchorActive::AG => "allow_A=true, allow_G=true",
            AnchorActive::None => "allow_A=false, allow_G=false",
        };
        f.write_str(s)
    }
}
