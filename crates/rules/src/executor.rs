//! Executor inference from dispatcher shorthand at the end of a comment.

use std::sync::LazyLock;

use regex::Regex;

pub const ASONOV: &str = "Асонов";
pub const YANDEX: &str = "Яндекс";
pub const VILI: &str = "Вили";

/// One entry of the ordered executor chain: the first rule whose
/// predicate accepts the comment names the executor.
pub struct ExecutorRule {
    pub executor: &'static str,
    pub matches: fn(&str) -> bool,
}

pub static EXECUTOR_RULES: &[ExecutorRule] = &[
    ExecutorRule { executor: ASONOV, matches: is_asonov },
    ExecutorRule { executor: YANDEX, matches: is_yandex },
    ExecutorRule { executor: VILI, matches: is_vili },
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
        .collect()
}

static YANDEX_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"я$", r"як$", r"яким$", r"яков$",
        r"\dя$", r"\dяк$", r"\dяким$", r"\dяков$",
        r"я\d{3}$", r"\dя\d{3}$",
        r"/я$", r"/як$", r"/яким$", r"/яков$", r"/яков", r"/яким",
        r"\sя$", r"\sяк$", r"\sяким$", r"\sяков$",
        r"я[^а-яё]*$", r"як[^а-яё]*$", r"яким[^а-яё]*$",
    ])
});

static YANDEX_EXCEPTIONS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"ния$", r"парадная\s*\d*$"]));

static VILI_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"влад\d{3}$", r"/в$", r"в$", r"/в\s*$", r"\dв\d{3}$", r"\d/в", r"\dв$"])
});

static VILI_EXCEPTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"ов$"]));

fn any_match(patterns: &[Regex], comment: &str) -> bool {
    patterns.iter().any(|re| re.is_match(comment))
}

fn is_asonov(comment: &str) -> bool {
    comment.contains("асонов")
}

fn is_yandex(comment: &str) -> bool {
    !any_match(&YANDEX_EXCEPTIONS, comment) && any_match(&YANDEX_PATTERNS, comment)
}

fn is_vili(comment: &str) -> bool {
    !any_match(&VILI_EXCEPTIONS, comment) && any_match(&VILI_PATTERNS, comment)
}

/// Infer the executor from a comment; the comment is trimmed and lowercased first.
pub fn infer_executor(comment: &str) -> Option<&'static str> {
    let comment = comment.trim().to_lowercase();
    if comment.is_empty() {
        return None;
    }
    let executor = EXECUTOR_RULES
        .iter()
        .find(|rule| (rule.matches)(&comment))
        .map(|rule| rule.executor);
    if let Some(name) = executor {
        log::debug!("executor inferred: {name} from {comment:?}");
    }
    executor
}
