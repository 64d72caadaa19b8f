use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One grading directive in a rubric.
///
/// Serialized with an inline `type` tag, e.g.
///
/// ```yaml
/// type: EXACT_MATCH
/// question_id: Q1
/// correct_answer: Paris
/// max_points: 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rule {
    ExactMatch(ExactMatchRule),
    NumericRange(NumericRangeRule),
    MultipleChoice(MultipleChoiceRule),
    Length(LengthRule),
    Keyword(KeywordRule),
    Regex(RegexRule),
    Similarity(SimilarityRule),
    Programmable(ProgrammableRule),
    Composite(CompositeRule),
    Conditional(ConditionalRule),
    AssumptionSet(AssumptionSetRule),
}

/// Fieldless discriminant of [`Rule`], used to key evaluator lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    ExactMatch,
    NumericRange,
    MultipleChoice,
    Length,
    Keyword,
    Regex,
    Similarity,
    Programmable,
    Composite,
    Conditional,
    AssumptionSet,
}

impl RuleKind {
    pub const ALL: [RuleKind; 11] = [
        RuleKind::ExactMatch,
        RuleKind::NumericRange,
        RuleKind::MultipleChoice,
        RuleKind::Length,
        RuleKind::Keyword,
        RuleKind::Regex,
        RuleKind::Similarity,
        RuleKind::Programmable,
        RuleKind::Composite,
        RuleKind::Conditional,
        RuleKind::AssumptionSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ExactMatch => "EXACT_MATCH",
            RuleKind::NumericRange => "NUMERIC_RANGE",
            RuleKind::MultipleChoice => "MULTIPLE_CHOICE",
            RuleKind::Length => "LENGTH",
            RuleKind::Keyword => "KEYWORD",
            RuleKind::Regex => "REGEX",
            RuleKind::Similarity => "SIMILARITY",
            RuleKind::Programmable => "PROGRAMMABLE",
            RuleKind::Composite => "COMPOSITE",
            RuleKind::Conditional => "CONDITIONAL",
            RuleKind::AssumptionSet => "ASSUMPTION_SET",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::ExactMatch(_) => RuleKind::ExactMatch,
            Rule::NumericRange(_) => RuleKind::NumericRange,
            Rule::MultipleChoice(_) => RuleKind::MultipleChoice,
            Rule::Length(_) => RuleKind::Length,
            Rule::Keyword(_) => RuleKind::Keyword,
            Rule::Regex(_) => RuleKind::Regex,
            Rule::Similarity(_) => RuleKind::Similarity,
            Rule::Programmable(_) => RuleKind::Programmable,
            Rule::Composite(_) => RuleKind::Composite,
            Rule::Conditional(_) => RuleKind::Conditional,
            Rule::AssumptionSet(_) => RuleKind::AssumptionSet,
        }
    }

    /// The question this rule reports against. Cross-question rules report
    /// against the question they grade (`then_question`) or the first listed id.
    pub fn primary_question(&self) -> &str {
        match self {
            Rule::ExactMatch(r) => &r.question_id,
            Rule::NumericRange(r) => &r.question_id,
            Rule::MultipleChoice(r) => &r.question_id,
            Rule::Length(r) => &r.question_id,
            Rule::Keyword(r) => &r.question_id,
            Rule::Regex(r) => &r.question_id,
            Rule::Similarity(r) => &r.question_id,
            Rule::Programmable(r) => &r.question_id,
            Rule::Composite(r) => &r.question_id,
            Rule::Conditional(r) => &r.then_question,
            Rule::AssumptionSet(r) => r.question_ids.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Every question id the rule reads, including those of nested rules.
    pub fn question_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_question_ids(&mut ids);
        ids
    }

    fn collect_question_ids(&self, out: &mut Vec<String>) {
        match self {
            Rule::Composite(r) => {
                push_unique(out, &r.question_id);
                for child in &r.rules {
                    child.collect_question_ids(out);
                }
            }
            Rule::Conditional(r) => {
                push_unique(out, &r.if_question);
                push_unique(out, &r.then_question);
            }
            Rule::AssumptionSet(r) => {
                for id in &r.question_ids {
                    push_unique(out, id);
                }
            }
            other => push_unique(out, other.primary_question()),
        }
    }

    /// Upper bound on the points this rule can award, as written in the rubric.
    pub fn declared_max_points(&self) -> f64 {
        match self {
            Rule::ExactMatch(r) => r.max_points,
            Rule::NumericRange(r) => r.max_points,
            Rule::MultipleChoice(r) => r.max_points,
            Rule::Length(r) => r.max_points,
            Rule::Keyword(r) => r.max_points,
            Rule::Regex(r) => r.max_points,
            Rule::Similarity(r) => r.max_points,
            Rule::Programmable(r) => r.max_points,
            Rule::Conditional(r) => r.max_points,
            Rule::AssumptionSet(r) => r.total_points(),
            Rule::Composite(r) => r.declared_max_points(),
        }
    }

    /// Traceable identifier such as `EXACT_MATCH:Q1`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind(), self.primary_question())
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Rule::ExactMatch(r) => r.description.as_deref(),
            Rule::NumericRange(r) => r.description.as_deref(),
            Rule::MultipleChoice(r) => r.description.as_deref(),
            Rule::Length(r) => r.description.as_deref(),
            Rule::Keyword(r) => r.description.as_deref(),
            Rule::Regex(r) => r.description.as_deref(),
            Rule::Similarity(r) => r.description.as_deref(),
            Rule::Programmable(r) => r.description.as_deref(),
            Rule::Composite(r) => r.description.as_deref(),
            Rule::Conditional(r) => r.description.as_deref(),
            Rule::AssumptionSet(r) => r.description.as_deref(),
        }
    }

    /// Direct sub-rules; empty for every variant except composites.
    pub fn children(&self) -> &[Rule] {
        match self {
            Rule::Composite(r) => &r.rules,
            _ => &[],
        }
    }
}

fn push_unique(out: &mut Vec<String>, id: &str) {
    if !out.iter().any(|existing| existing == id) {
        out.push(id.to_string());
    }
}

// --- Atomic rules ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactMatchRule {
    pub question_id: String,
    pub correct_answer: String,
    pub max_points: f64,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub trim_whitespace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRangeRule {
    pub question_id: String,
    pub min_value: f64,
    pub max_value: f64,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceScoring {
    #[default]
    AllOrNothing,
    Partial,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceRule {
    pub question_id: String,
    pub correct_answers: Vec<String>,
    pub max_points: f64,
    #[serde(default)]
    pub scoring_mode: ChoiceScoring,
    /// Points removed per wrong selection in `negative` mode. Defaults to the
    /// value of one correct selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_per_wrong: Option<f64>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    #[default]
    Characters,
    Words,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthRule {
    pub question_id: String,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub mode: LengthUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
    #[default]
    All,
    Any,
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub question_id: String,
    pub keywords: Vec<String>,
    pub max_points: f64,
    #[serde(default)]
    pub mode: KeywordMode,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_true")]
    pub trim_whitespace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegexMatchMode {
    #[default]
    All,
    Any,
    Count,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexRule {
    pub question_id: String,
    pub patterns: Vec<String>,
    pub max_points: f64,
    #[serde(default)]
    pub match_mode: RegexMatchMode,
    /// In `all` mode, award a share per matching pattern instead of nothing.
    #[serde(default)]
    pub partial_credit: bool,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub multiline: bool,
    #[serde(default)]
    pub dotall: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityAlgorithm {
    #[default]
    Levenshtein,
    JaroWinkler,
    TokenSort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRule {
    pub question_id: String,
    pub reference_answers: Vec<String>,
    pub max_points: f64,
    #[serde(default)]
    pub algorithm: SimilarityAlgorithm,
    #[serde(default = "default_similarity_threshold")]
    pub threshold: f64,
    #[serde(default = "default_true")]
    pub partial_credit: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// --- Scripted rule ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgrammableRule {
    pub question_id: String,
    pub script: String,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// --- Composite ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompositeMode {
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
    #[serde(alias = "weighted")]
    Weighted,
    #[serde(alias = "sum")]
    Sum,
    #[serde(alias = "max")]
    Max,
    #[serde(alias = "min")]
    Min,
    #[serde(alias = "average")]
    Average,
    #[serde(alias = "multiply")]
    Multiply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRule {
    pub question_id: String,
    pub rules: Vec<Rule>,
    pub mode: CompositeMode,
    /// Parallel to `rules`; required for `WEIGHTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    #[serde(default = "default_correctness_threshold")]
    pub correctness_threshold: f64,
    /// `OR` only: number of children that must fully pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_passing: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CompositeRule {
    pub fn declared_max_points(&self) -> f64 {
        let maxes = self.rules.iter().map(Rule::declared_max_points);
        match self.mode {
            CompositeMode::And | CompositeMode::Weighted | CompositeMode::Sum => maxes.sum(),
            CompositeMode::Or | CompositeMode::Max => maxes.fold(0.0, f64::max),
            CompositeMode::Min => maxes.reduce(f64::min).unwrap_or(0.0),
            CompositeMode::Average => {
                if self.rules.is_empty() {
                    0.0
                } else {
                    maxes.sum::<f64>() / self.rules.len() as f64
                }
            }
            CompositeMode::Multiply => {
                if self.rules.is_empty() {
                    0.0
                } else {
                    maxes.product()
                }
            }
        }
    }
}

// --- Cross-question rules ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub if_question: String,
    pub if_answer: String,
    pub then_question: String,
    pub then_correct_answer: String,
    pub max_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One complete interpretation of the correct answers across several questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    pub name: String,
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionMode {
    #[default]
    FavorBest,
    FirstMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSetRule {
    pub question_ids: Vec<String>,
    pub answer_sets: Vec<AnswerSet>,
    #[serde(default)]
    pub mode: AssumptionMode,
    /// Per-question weight; questions not listed are worth 1 point.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub points_per_question: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AssumptionSetRule {
    pub fn points_for(&self, question_id: &str) -> f64 {
        self.points_per_question
            .get(question_id)
            .copied()
            .unwrap_or(1.0)
    }

    pub fn total_points(&self) -> f64 {
        self.question_ids.iter().map(|q| self.points_for(q)).sum()
    }
}

//Default Functions

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_correctness_threshold() -> f64 {
    1.0
}
