//! Correct-answer detection by marker symbol.

use crate::core::{ContentItem, TestOption, TestQuestion};

/// Strips `marker` from the first text item that starts with it (ignoring
/// leading whitespace), together with the whitespace that follows.
///
/// Returns whether a marker was found. An empty marker never matches.
pub fn strip_marker(items: &mut [ContentItem], marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    for item in items.iter_mut().filter(|item| item.is_text()) {
        if let Some(rest) = item.value.trim_start().strip_prefix(marker) {
            item.value = rest.trim_start().to_string();
            return true;
        }
    }
    false
}

/// Builds a question from the row contents of one table.
///
/// Row 0 is the question, row 1 the default answer, the remaining rows further
/// options. Markers are looked for in rows 2.. and then in the default row;
/// the first marked option in row order is the correct one. Without any
/// marker the default row is correct. Returns `None` for fewer than 2 rows.
pub fn build_question(rows: Vec<Vec<ContentItem>>, marker: &str) -> Option<TestQuestion> {
    if rows.len() < 2 {
        return None;
    }
    let mut rows = rows.into_iter();
    let question = rows.next()?;
    let mut options: Vec<TestOption> = rows.map(TestOption::new).collect();

    let mut marked = vec![false; options.len()];
    for (index, option) in options.iter_mut().enumerate().skip(1) {
        marked[index] = strip_marker(&mut option.content, marker);
    }
    marked[0] = strip_marker(&mut options[0].content, marker);

    let correct_index = marked.iter().position(|&m| m).unwrap_or(0);
    if marked.iter().filter(|&&m| m).count() > 1 {
        log::debug!(
            "Several options marked correct, keeping option {}",
            correct_index + 1
        );
    }
    options[correct_index].is_correct = true;
    let correct = options[correct_index].content.clone();

    Some(TestQuestion {
        question,
        correct,
        options,
    })
}
