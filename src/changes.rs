use crate::models::{ChangeAction, ProposedChange};
use log::debug;

const FENCE: &str = "```";

#[derive(Debug)]
enum ScanState {
    Outside,
    /// Inside a fence, before any content line has decided whether this
    /// block is a change block or plain prose/code.
    ExpectMarker,
    /// Inside a fence whose marker matched; accumulating body lines.
    InBody {
        action: ChangeAction,
        path: String,
        body: Vec<String>,
    },
    /// Inside a fence with no marker; skipping until it closes.
    SkipBlock,
}

/// Extracts proposed file changes from free-form LLM text.
///
/// A change block is a triple-backtick fence (optional language tag on the
/// opening line) whose first content line is `// FILE: <path>` or
/// `// CREATE: <path>`. The body up to the closing fence, trimmed of leading
/// and trailing whitespace, becomes the full replacement content. Fenced
/// blocks without a marker are not an error, just not changes. An
/// unterminated fence is bounded at end of input.
pub fn parse_changes(text: &str) -> Vec<ProposedChange> {
    let mut changes = Vec::new();
    let mut state = ScanState::Outside;

    for line in text.lines() {
        let trimmed = line.trim();
        state = match state {
            ScanState::Outside => {
                if trimmed.starts_with(FENCE) {
                    ScanState::ExpectMarker
                } else {
                    ScanState::Outside
                }
            }
            ScanState::ExpectMarker => {
                if trimmed.starts_with(FENCE) {
                    // Empty fence, closed before any content appeared.
                    ScanState::Outside
                } else if trimmed.is_empty() {
                    // Blank lines between the fence and the marker are
                    // tolerated.
                    ScanState::ExpectMarker
                } else if let Some((action, path)) = parse_marker(trimmed) {
                    ScanState::InBody {
                        action,
                        path,
                        body: Vec::new(),
                    }
                } else {
                    ScanState::SkipBlock
                }
            }
            ScanState::InBody {
                action,
                path,
                mut body,
            } => {
                if trimmed.starts_with(FENCE) {
                    changes.push(finish_block(action, path, &body));
                    ScanState::Outside
                } else {
                    body.push(line.to_string());
                    ScanState::InBody { action, path, body }
                }
            }
            ScanState::SkipBlock => {
                if trimmed.starts_with(FENCE) {
                    ScanState::Outside
                } else {
                    ScanState::SkipBlock
                }
            }
        };
    }

    // A change block with no closing fence still counts, bounded at EOF.
    if let ScanState::InBody { action, path, body } = state {
        changes.push(finish_block(action, path, &body));
    }

    debug!("Parsed {} change block(s) from response", changes.len());
    changes
}

fn parse_marker(line: &str) -> Option<(ChangeAction, String)> {
    let rest = line.strip_prefix("//")?.trim_start();
    let (action, path) = if let Some(p) = rest.strip_prefix("FILE:") {
        (ChangeAction::Modify, p)
    } else if let Some(p) = rest.strip_prefix("CREATE:") {
        (ChangeAction::Create, p)
    } else {
        return None;
    };
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    Some((action, path.to_string()))
}

fn finish_block(action: ChangeAction, path: String, body: &[String]) -> ProposedChange {
    ProposedChange {
        file_path: path,
        action,
        new_content: body.join("\n").trim().to_string(),
        applied: false,
    }
}
