//! Instructions and payload sent to the translation model.

use crate::sources::SourceFile;

pub const SYSTEM_PROMPT: &str = r#"
Convert the following code to LLVM IR.

Rules:
- Output only raw LLVM IR, no comments or code blocks.
- Do not include 'datalayout' or 'target triple'.
- For the most part, do not take the user's syntax literally, for example if they write
    `print "hello world"`, you should try convert it to a call to `puts` with the string constant.
- For every string constant:
  * The array size must be (string length + 1) for the null terminator (\00).
  * Make sure the size is not bigger or smaller than the length of the string
  * The string literal must end with \00 (single backslash, not double).
  * The type in getelementptr must exactly match the string constant's type.

Example:

Anylang code:
print "whats good bro yooooo!"

LLVM IR:
@.str = private unnamed_addr constant [24 x i8] c"whats good bro yooooo!\00", align 1
declare i32 @puts(i8*)
define i32 @main() {
entry:
    %0 = call i32 @puts(i8* getelementptr inbounds ([24 x i8], [24 x i8]* @.str, i32 0, i32 0))
    ret i32 0
}
"#;

/// Joins the sources into one document, each under a `# <file name>` header.
pub fn build_payload(sources: &[SourceFile]) -> String {
    sources
        .iter()
        .map(|source| format!("# {}\n{}", source.name, source.contents))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub system_instruction: String,
    pub payload: String,
}

impl TranslationRequest {
    pub fn for_sources(sources: &[SourceFile]) -> Self {
        Self {
            system_instruction: SYSTEM_PROMPT.into(),
            payload: build_payload(sources),
        }
    }
}
