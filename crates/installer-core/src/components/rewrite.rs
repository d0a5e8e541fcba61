//! Textual import rewrite from registry placeholders to local aliases.
//!
//! Only quoted specifiers of the form `"<placeholder>/<id>"` are touched;
//! anything assembled at runtime is left as is.

use regex::Regex;

/// Replace every `"<placeholder>/<id>"` with `"<alias>/<name>"`, where `name`
/// comes from `resolve(id)`.
pub fn rewrite_imports<F>(content: &str, placeholder: &str, alias: &str, resolve: F) -> String
where
    F: Fn(&str) -> String,
{
    let pattern = format!(r#"(["']){}/([^"'\n]+)(["'])"#, regex::escape(placeholder));
    let Ok(re) = Regex::new(&pattern) else {
        return content.to_string();
    };
    let alias = alias.trim_end_matches('/');

    re.replace_all(content, |captures: &regex::Captures<'_>| {
        let id = strip_extension(&captures[2]);
        format!(
            "{}{}/{}{}",
            &captures[1],
            alias,
            resolve(id),
            &captures[3]
        )
    })
    .into_owned()
}

fn strip_extension(id: &str) -> &str {
    [".tsx", ".ts", ".jsx", ".js"]
        .iter()
        .find_map(|ext| id.strip_suffix(ext))
        .unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn retargets_to_local_names() {
        let content = "import { Icon } from \"$components/icon\";\nimport { Card } from '$components/card.tsx';\nimport { cn } from \"$utils/cn\";\n";
        let rewritten = rewrite_imports(content, "$components", "@/components/ui/", |id| {
            if id == "icon" {
                "au-icon".to_string()
            } else {
                id.to_string()
            }
        });
        assert_eq!(
            rewritten,
            "import { Icon } from \"@/components/ui/au-icon\";\nimport { Card } from '@/components/ui/card';\nimport { cn } from \"$utils/cn\";\n"
        );

        let rewritten = rewrite_imports(&rewritten, "$utils", "@/lib", str::to_string);
        assert!(rewritten.contains("from \"@/lib/cn\""));
    }
}
