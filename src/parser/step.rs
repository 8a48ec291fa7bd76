use crate::{
    models::{ParserRules, StepRecord},
    parser::ParseError,
};

/// Parses the raw text of one step.
///
/// The keyword is the first whitespace token of the first line and the
/// argument is whatever follows it. If the error marker appears anywhere in
/// `text`, the record carries every line from the first marker line to the
/// end, terminators included.
pub fn parse_step(text: &str, rules: &ParserRules) -> Result<StepRecord, ParseError> {
    let first_line = text.lines().next().unwrap_or_default().trim();

    let Some(kind) = first_line.split_whitespace().next() else {
        return Err(ParseError::Step {
            text: text.to_string(),
        });
    };

    // `first_line` is trimmed, so it starts with `kind`.
    let argument = first_line[kind.len()..].trim().to_string();

    let marker = rules.error_marker.as_str();
    let error_log = text.contains(marker).then(|| {
        text.split_inclusive('\n')
            .skip_while(|line| !line.contains(marker))
            .collect::<String>()
    });

    Ok(StepRecord {
        kind: kind.to_string(),
        argument,
        error_log,
    })
}
