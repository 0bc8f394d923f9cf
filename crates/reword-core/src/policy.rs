use serde::{Deserialize, Serialize};

/// A named transformation intent. Declaration order is conflict priority:
/// when two modes give contradictory instructions, the earlier mode wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Simplify,
    Summarize,
    Clarify,
    Formalize,
    Casualize,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Simplify,
        Mode::Summarize,
        Mode::Clarify,
        Mode::Formalize,
        Mode::Casualize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simplify => "simplify",
            Mode::Summarize => "summarize",
            Mode::Clarify => "clarify",
            Mode::Formalize => "formalize",
            Mode::Casualize => "casualize",
        }
    }

    /// Qualitative do-rules for this mode.
    fn dos(&self) -> &'static [&'static str] {
        match self {
            Mode::Simplify => &[
                "Rewrite using common, everyday words.",
                "Prefer short sentences that carry one idea each.",
                "Preserve the original meaning and all factual claims.",
                "Keep the original language of the text.",
            ],
            Mode::Summarize => &[
                "Condense the text to its key points.",
                "Lead with the most important point.",
                "Preserve the original meaning and all factual claims.",
                "Keep the original language of the text.",
            ],
            Mode::Clarify => &[
                "Briefly explain technical terms in plain words.",
                "Expand ambiguous references so each sentence stands alone.",
                "Keep the original language of the text.",
            ],
            Mode::Formalize => &[
                "Use a formal, professional register.",
                "Use complete sentences and precise vocabulary.",
                "Keep the original language of the text.",
            ],
            Mode::Casualize => &[
                "Use a relaxed, conversational register.",
                "Address the reader directly where it feels natural.",
                "Keep the original language of the text.",
            ],
        }
    }

    /// Qualitative don't-rules for this mode.
    fn donts(&self) -> &'static [&'static str] {
        match self {
            Mode::Simplify => &[
                "Do not add information that is not in the source.",
                "Do not use idioms or figurative language.",
            ],
            Mode::Summarize => &[
                "Do not add information that is not in the source.",
                "Do not editorialize or evaluate the content.",
            ],
            Mode::Clarify => &["Do not add information that is not in the source."],
            Mode::Formalize => &[
                "Do not use contractions or slang.",
                "Do not add information that is not in the source.",
            ],
            Mode::Casualize => &[
                "Do not use corporate or academic jargon.",
                "Do not add information that is not in the source.",
            ],
        }
    }
}

/// Ordered, duplicate-free set of modes. Insertion order is kept for
/// presentation; compilation always re-sorts by fixed priority.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSet {
    modes: Vec<Mode>,
}

impl ModeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mode: Mode) -> bool {
        if self.modes.contains(&mode) {
            false
        } else {
            self.modes.push(mode);
            true
        }
    }

    pub fn contains(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }

    pub fn iter(&self) -> impl Iterator<Item = Mode> + '_ {
        self.modes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// First mode in fixed priority order; tags Markers produced from
    /// this set.
    pub fn primary(&self) -> Option<Mode> {
        self.modes.iter().copied().min()
    }
}

impl FromIterator<Mode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = Mode>>(iter: I) -> Self {
        let mut set = Self::new();
        for mode in iter {
            set.insert(mode);
        }
        set
    }
}

/// Target reading-sophistication tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeLevel {
    Elementary,
    MiddleSchool,
    HighSchool,
    College,
    Expert,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 5] = [
        GradeLevel::Elementary,
        GradeLevel::MiddleSchool,
        GradeLevel::HighSchool,
        GradeLevel::College,
        GradeLevel::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeLevel::Elementary => "elementary",
            GradeLevel::MiddleSchool => "middle_school",
            GradeLevel::HighSchool => "high_school",
            GradeLevel::College => "college",
            GradeLevel::Expert => "expert",
        }
    }

    /// Quantitative limits for this tier.
    pub fn policy(&self) -> GradePolicy {
        match self {
            GradeLevel::Elementary => GradePolicy {
                max_sentence_length: 8,
                max_sentence_count: 3,
                max_key_points: 3,
                max_connectives_per_sentence: 1,
                annotate_once: true,
                compression_ratio: (0.3, 0.6),
            },
            GradeLevel::MiddleSchool => GradePolicy {
                max_sentence_length: 12,
                max_sentence_count: 4,
                max_key_points: 4,
                max_connectives_per_sentence: 1,
                annotate_once: true,
                compression_ratio: (0.4, 0.7),
            },
            GradeLevel::HighSchool => GradePolicy {
                max_sentence_length: 18,
                max_sentence_count: 5,
                max_key_points: 5,
                max_connectives_per_sentence: 2,
                annotate_once: true,
                compression_ratio: (0.5, 0.8),
            },
            GradeLevel::College => GradePolicy {
                max_sentence_length: 24,
                max_sentence_count: 7,
                max_key_points: 6,
                max_connectives_per_sentence: 2,
                annotate_once: false,
                compression_ratio: (0.6, 0.9),
            },
            GradeLevel::Expert => GradePolicy {
                max_sentence_length: 32,
                max_sentence_count: 9,
                max_key_points: 8,
                max_connectives_per_sentence: 3,
                annotate_once: false,
                compression_ratio: (0.7, 1.0),
            },
        }
    }
}

/// Quantitative limits carried by a grade tier. Sentence length is in
/// words; compression ratio is output/input length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradePolicy {
    pub max_sentence_length: usize,
    pub max_sentence_count: usize,
    pub max_key_points: usize,
    pub max_connectives_per_sentence: usize,
    pub annotate_once: bool,
    pub compression_ratio: (f32, f32),
}

/// One qualitative instruction, attributed to the highest-priority mode
/// that contributed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub text: &'static str,
    pub source: Mode,
}

/// The conflict rule every bundle carries verbatim.
pub const PRECEDENCE_NOTE: &str =
    "earlier mode wins; quantitative limits always dominate qualitative instructions";

/// Compiled instruction set for one request: deduplicated qualitative
/// rules in priority order, plus the grade's quantitative policy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DirectiveBundle {
    pub modes: Vec<Mode>,
    pub dos: Vec<Directive>,
    pub donts: Vec<Directive>,
    pub grade: GradeLevel,
    pub policy: GradePolicy,
    pub precedence_note: &'static str,
}

/// Compile a mode set and grade into a directive bundle. Pure and
/// deterministic: identical inputs produce structurally identical bundles
/// regardless of mode insertion order.
pub fn compile(mode_set: &ModeSet, grade: GradeLevel) -> DirectiveBundle {
    let mut modes: Vec<Mode> = mode_set.iter().collect();
    modes.sort();

    let mut dos = Vec::new();
    let mut donts = Vec::new();
    for &mode in &modes {
        for &text in mode.dos() {
            if !dos.iter().any(|d: &Directive| d.text == text) {
                dos.push(Directive { text, source: mode });
            }
        }
        for &text in mode.donts() {
            if !donts.iter().any(|d: &Directive| d.text == text) {
                donts.push(Directive { text, source: mode });
            }
        }
    }

    DirectiveBundle {
        modes,
        dos,
        donts,
        grade,
        policy: grade.policy(),
        precedence_note: PRECEDENCE_NOTE,
    }
}
