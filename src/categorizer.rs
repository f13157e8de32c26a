use std::sync::OnceLock;

use regex::Regex;

use crate::names::normalize;
use crate::Category;

const LAB_PATTERN: &str = r"\b(pl|tl)\d+";
const PRACTICAL_PATTERN: &str = r"\btp\d+";
const LECTURE_PATTERN: &str = r"\bt\d+";

const LAB_KEYWORDS: &[&str] = &["laborator"];

const EXAMPLE_KEYWORDS: &[&str] = &[
    "resolv", "solucao", "solution", "exemplo", "sample", "gabarito",
];

const PRACTICAL_KEYWORDS: &[&str] = &[
    "ficha", "exercicio", "problem", "enunciado", "guiao", "projeto", "project", "tpc",
];

const LECTURE_KEYWORDS: &[&str] = &[
    "teoric", "lecture", "slide", "acetato", "apresentaca", "aula", "docente", "sumario",
    "capitulo",
];

const SECTION_THEORY: &[&str] = &["teoric"];
const SECTION_PRACTICE: &[&str] = &["pratic"];

/// Label used by `explain` when no rule matched
pub const FALLBACK_RULE: &str = "fallback";

/// A filename and its section, in raw and normalized form
#[derive(Debug, Clone)]
pub struct Subject<'a> {
    pub raw_filename: &'a str,
    pub filename: String,
    pub section: String,
}

impl<'a> Subject<'a> {
    pub fn new(raw_filename: &'a str, raw_section: &str) -> Self {
        Self {
            raw_filename,
            filename: normalize(raw_filename),
            section: normalize(raw_section),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Filename,
    Section,
    Either,
}

#[derive(Debug)]
enum Condition {
    NotPdf,
    FilenamePattern(Regex),
    Keywords(&'static [&'static str], Scope),
    Any(Vec<Condition>),
}

impl Condition {
    fn matches(&self, subject: &Subject<'_>) -> bool {
        match self {
            Condition::NotPdf => !subject.raw_filename.to_lowercase().ends_with(".pdf"),
            Condition::FilenamePattern(regex) => regex.is_match(&subject.filename),
            Condition::Keywords(keywords, scope) => {
                let hit = |text: &str| keywords.iter().any(|k| text.contains(k));
                match scope {
                    Scope::Filename => hit(&subject.filename),
                    Scope::Section => hit(&subject.section),
                    Scope::Either => hit(&subject.filename) || hit(&subject.section),
                }
            }
            Condition::Any(conditions) => conditions.iter().any(|c| c.matches(subject)),
        }
    }
}

/// One row of the cascade
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    condition: Condition,
}

impl Rule {
    pub fn matches(&self, subject: &Subject<'_>) -> bool {
        self.condition.matches(subject)
    }
}

/// Ordered rule table; the first matching rule decides the category.
#[derive(Debug)]
pub struct Categorizer {
    rules: Vec<Rule>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Categorizer {
    pub fn new() -> Self {
        let pattern = |p: &str| {
            Condition::FilenamePattern(Regex::new(p).expect("Invalid categorizer regex"))
        };

        let rules = vec![
            Rule {
                name: "non-pdf",
                category: Category::Anexos,
                condition: Condition::NotPdf,
            },
            Rule {
                name: "lab",
                category: Category::PL,
                condition: Condition::Any(vec![
                    pattern(LAB_PATTERN),
                    Condition::Keywords(LAB_KEYWORDS, Scope::Either),
                ]),
            },
            Rule {
                name: "solved-example",
                category: Category::Exemplos,
                condition: Condition::Keywords(EXAMPLE_KEYWORDS, Scope::Filename),
            },
            Rule {
                name: "practical",
                category: Category::TP,
                condition: Condition::Any(vec![
                    pattern(PRACTICAL_PATTERN),
                    Condition::Keywords(PRACTICAL_KEYWORDS, Scope::Filename),
                ]),
            },
            Rule {
                name: "lecture",
                category: Category::T,
                condition: Condition::Any(vec![
                    pattern(LECTURE_PATTERN),
                    Condition::Keywords(LECTURE_KEYWORDS, Scope::Filename),
                ]),
            },
            Rule {
                name: "section-theory",
                category: Category::T,
                condition: Condition::Keywords(SECTION_THEORY, Scope::Section),
            },
            Rule {
                name: "section-practice",
                category: Category::TP,
                condition: Condition::Keywords(SECTION_PRACTICE, Scope::Section),
            },
        ];

        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categorize(&self, filename: &str, section: &str) -> Category {
        self.explain(filename, section).1
    }

    /// Category plus the name of the rule that produced it
    pub fn explain(&self, filename: &str, section: &str) -> (&'static str, Category) {
        let subject = Subject::new(filename, section);
        self.rules
            .iter()
            .find(|rule| rule.matches(&subject))
            .map(|rule| (rule.name, rule.category))
            .unwrap_or((FALLBACK_RULE, Category::Outros))
    }
}

/// Categorize with a shared, lazily built rule table.
pub fn categorize(filename: &str, section: &str) -> Category {
    shared().categorize(filename, section)
}

pub fn shared() -> &'static Categorizer {
    static CATEGORIZER: OnceLock<Categorizer> = OnceLock::new();
    CATEGORIZER.get_or_init(Categorizer::new)
}
