use std::fmt::Write;

use reword_core::chunk::Chunk;
use reword_core::policy::DirectiveBundle;

/// Render the per-chunk instruction prompt from a compiled bundle.
///
/// Layout: task line, do-rules, don't-rules, quantitative limits, the
/// precedence note, optional context-only overlap, then the text to
/// rewrite between sentinel lines.
pub fn build_prompt(chunk: &Chunk, bundle: &DirectiveBundle) -> String {
    let mut out = String::new();

    let mode_names: Vec<&str> = bundle.modes.iter().map(|m| m.as_str()).collect();
    let _ = writeln!(
        out,
        "Rewrite the text below ({} it) for a {} reading level.",
        mode_names.join(", then "),
        bundle.grade.as_str().replace('_', " ")
    );

    out.push_str("\nFollow these rules:\n");
    for (i, d) in bundle.dos.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, d.text);
    }

    out.push_str("\nAvoid:\n");
    for (i, d) in bundle.donts.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, d.text);
    }

    let p = &bundle.policy;
    out.push_str("\nHard limits:\n");
    let _ = writeln!(out, "- At most {} words per sentence.", p.max_sentence_length);
    let _ = writeln!(out, "- At most {} sentences per paragraph.", p.max_sentence_count);
    let _ = writeln!(out, "- Cover at most {} key points.", p.max_key_points);
    let _ = writeln!(
        out,
        "- At most {} connective words (however, therefore, ...) per sentence.",
        p.max_connectives_per_sentence
    );
    if p.annotate_once {
        out.push_str("- Explain each technical term at most once.\n");
    }
    let _ = writeln!(
        out,
        "- Keep the rewrite between {:.0}% and {:.0}% of the original length.",
        p.compression_ratio.0 * 100.0,
        p.compression_ratio.1 * 100.0
    );

    let _ = writeln!(out, "\nIf rules conflict: {}.", bundle.precedence_note);

    let body = chunk.body();
    if chunk.overlap > 0 {
        let context: String = chunk.text.chars().take(chunk.overlap).collect();
        let _ = writeln!(
            out,
            "\nPreceding context (do NOT include it in your rewrite):\n{context}"
        );
    }

    let _ = write!(
        out,
        "\nText to rewrite (reply with the rewritten text only):\n---\n{body}\n---"
    );

    out
}
