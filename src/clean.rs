/// Strip markdown code-fence lines from LLM output.
///
/// Providers routinely wrap generated components in ```` ```svelte ````
/// blocks even when told not to. Only fence lines are removed; backticks
/// inside the code (template literals, inline code in comments) must
/// survive untouched.
pub fn clean_markdown_fences(code: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut after_fence = false;

    for line in code.lines() {
        if is_fence_line(line) {
            after_fence = true;
            continue;
        }
        // A fence match also swallows the blank lines that follow it,
        // so removing a block boundary doesn't leave a gap behind.
        if after_fence && line.trim().is_empty() {
            continue;
        }
        after_fence = false;
        kept.push(line);
    }

    kept.join("\n").trim().to_string()
}

fn is_fence_line(line: &str) -> bool {
    let trimmed = line.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => rest.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}
