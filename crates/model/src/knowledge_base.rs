use std::collections::BTreeSet;

/// The knowledge base shipped with the crate, used when no other document is
/// configured.
pub const SAMPLE_KNOWLEDGE_BASE: &str =
    include_str!("./sample_knowledge_base.md");

/// Fraction of an entry's keywords a query must mention to match it.
const MATCH_THRESHOLD: f64 = 0.6;

const STOPWORDS: &[&str] = &[
    "about", "and", "any", "are", "can", "does", "for", "from", "have", "how",
    "should", "that", "the", "there", "this", "what", "when", "where", "which",
    "why", "with", "you", "your",
];

/// A question and its answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry {
    /// The `##` heading the entry was found under.
    pub section: Option<String>,
    /// The question, without markup.
    pub question: String,
    /// The answer, joined into a single paragraph.
    pub answer: String,
}

/// A knowledge base document.
///
/// The format is a markdown subset:
///
/// ```text
/// ## Section
/// **Q: A question?**
/// A: The answer, possibly
/// spanning several lines.
/// ```
///
/// Anything else is ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<Entry>,
}

impl KnowledgeBase {
    /// Parses a document.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut section = None;
        let mut question: Option<String> = None;
        let mut answer: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if let Some(heading) = line.strip_prefix("## ") {
                flush(&mut entries, &section, &mut question, &mut answer);
                section = Some(heading.trim().to_owned());
            } else if let Some(rest) = line.strip_prefix("**Q:") {
                flush(&mut entries, &section, &mut question, &mut answer);
                let rest = rest.trim_end().trim_end_matches("**");
                question = Some(rest.trim().to_owned());
            } else if let Some(rest) = line.strip_prefix("A:") {
                answer = Some(rest.trim().to_owned());
            } else if line.is_empty() {
                flush(&mut entries, &section, &mut question, &mut answer);
            } else if let Some(answer) = answer.as_mut() {
                // Continuation of a multi-line answer.
                answer.push(' ');
                answer.push_str(line);
            }
        }
        flush(&mut entries, &section, &mut question, &mut answer);

        Self { entries }
    }

    /// Parses [`SAMPLE_KNOWLEDGE_BASE`].
    #[inline]
    pub fn sample() -> Self {
        Self::parse(SAMPLE_KNOWLEDGE_BASE)
    }

    /// Returns all entries in document order.
    #[inline]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns the 1-based entry, as numbered by [`Self::render_numbered`].
    #[inline]
    pub fn entry(&self, number: usize) -> Option<&Entry> {
        number.checked_sub(1).and_then(|idx| self.entries.get(idx))
    }

    /// Renders the entries as a numbered list, for prompting a model.
    pub fn render_numbered(&self) -> String {
        let mut out = String::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            if !out.is_empty() {
                out.push('\n');
            }
            let number = idx + 1;
            match &entry.section {
                Some(section) => out.push_str(&format!(
                    "[{number}] ({section}) Q: {}\nA: {}\n",
                    entry.question, entry.answer
                )),
                None => out.push_str(&format!(
                    "[{number}] Q: {}\nA: {}\n",
                    entry.question, entry.answer
                )),
            }
        }
        out
    }

    /// Finds the entry whose question best matches the query by keywords.
    ///
    /// Returns `None` if no entry reaches the match threshold. Ties go to
    /// the entry that appears first.
    pub fn lookup(&self, query: &str) -> Option<&Entry> {
        let query_words = keywords(query);
        if query_words.is_empty() {
            return None;
        }

        let mut best: Option<(f64, &Entry)> = None;
        for entry in &self.entries {
            let entry_words = keywords(&entry.question);
            if entry_words.is_empty() {
                continue;
            }
            let shared = entry_words.intersection(&query_words).count();
            let score = shared as f64 / entry_words.len() as f64;
            if score < MATCH_THRESHOLD {
                continue;
            }
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, entry));
            }
        }
        best.map(|(_, entry)| entry)
    }
}

fn flush(
    entries: &mut Vec<Entry>,
    section: &Option<String>,
    question: &mut Option<String>,
    answer: &mut Option<String>,
) {
    if let (Some(question), Some(answer)) = (question.take(), answer.take()) {
        entries.push(Entry {
            section: section.clone(),
            question,
            answer,
        });
    }
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}
