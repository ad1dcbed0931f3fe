use super::has;
use crate::checklist::Check;
use crate::context::ContextHints;
use crate::extract::{is_frontend, is_markup, is_test, Artifact, ArtifactKind, Change, LinePattern};
use crate::types::{Confidence, Severity};

const CATEGORY_BUNDLE: &str = "bundle";
const CATEGORY_RENDER: &str = "rendering";
const CATEGORY_LOADING: &str = "loading";

const EXISTS_AFTER: &[Change] = &[Change::Added, Change::Present];

pub(super) fn file_kind(path: &str) -> Option<ArtifactKind> {
    (is_frontend(path) && !is_test(path)).then_some(ArtifactKind::SourceFile)
}

fn frontend_src(path: &str) -> bool {
    is_frontend(path) && !is_test(path)
}

fn markup_src(path: &str) -> bool {
    is_markup(path) && !is_test(path)
}

pub(super) fn patterns() -> Vec<LinePattern> {
    vec![
        LinePattern {
            kind: ArtifactKind::HeavyImport,
            files: frontend_src,
            pattern: r#"(?:import\s+(?:\*\s+as\s+\w+|\w+|\{[^}]*\})\s+from\s+|require\(\s*)['"](moment|lodash|rxjs|jquery|d3|three|chart\.js|@mui/material|@mui/icons-material|antd|firebase|aws-sdk)['"]"#,
        },
        LinePattern {
            kind: ArtifactKind::EffectHook,
            files: frontend_src,
            pattern: r#"\buse(Layout)?Effect\s*\("#,
        },
        LinePattern {
            kind: ArtifactKind::InlineHandler,
            files: markup_src,
            pattern: r#"\bon[A-Z]\w*=\{\s*(\([^)]*\)|\w+)\s*=>"#,
        },
        LinePattern {
            kind: ArtifactKind::ImageTag,
            files: markup_src,
            pattern: r#"<(img|Image)\b"#,
        },
        LinePattern {
            kind: ArtifactKind::SyncScript,
            files: markup_src,
            pattern: r#"<script\b[^>]*\bsrc="#,
        },
        LinePattern {
            kind: ArtifactKind::ListRender,
            files: markup_src,
            pattern: r#"\.map\(\s*\(?[\w\s,{}]*\)?\s*=>\s*[(<]"#,
        },
        LinePattern {
            kind: ArtifactKind::LayoutRead,
            files: frontend_src,
            pattern: r#"\b(offsetHeight|offsetWidth|offsetTop|offsetLeft|scrollHeight|scrollTop|clientHeight|clientWidth|getBoundingClientRect|getComputedStyle)\b"#,
        },
    ]
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

fn mobile_escalates(base: Severity, hints: &ContextHints) -> Severity {
    if hints.mobile_first {
        base.escalate()
    } else {
        base
    }
}

fn is_blocking_script(a: &Artifact, _: &ContextHints) -> bool {
    !(has(a, " async") || has(a, " defer") || has(a, "type=\"module\""))
}

/// `useEffect(() => ...)` closed on the same line with no dependency array.
fn effect_without_deps(a: &Artifact, _: &ContextHints) -> bool {
    let s = a.snippet.trim_end_matches(';').trim_end();
    s.ends_with(')') && !s.contains('[')
}

fn image_missing_dimensions(a: &Artifact, _: &ContextHints) -> bool {
    !(has(a, "width") && has(a, "height")) && !has(a, " fill")
}

fn image_not_lazy(a: &Artifact, _: &ContextHints) -> bool {
    a.snippet.starts_with("<img") && !has(a, "loading=")
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

pub(super) fn rules() -> Vec<Check> {
    vec![
        rule! {
            id: "render-blocking-script",
            category: CATEGORY_LOADING,
            kinds: &[ArtifactKind::SyncScript],
            severity: |_, _| Severity::High,
            confidence: Confidence::High,
            title: "Render-blocking script",
            changes: EXISTS_AFTER,
            condition: is_blocking_script,
            remediation: "Add `defer` or `async`, or load the script as a module."
        },
        rule! {
            id: "heavy-import",
            category: CATEGORY_BUNDLE,
            kinds: &[ArtifactKind::HeavyImport],
            severity: |_, h| mobile_escalates(Severity::Med, h),
            confidence: Confidence::High,
            title: "Whole-library import of a heavy dependency",
            changes: EXISTS_AFTER,
            remediation: "Import the specific submodule, switch to a lighter alternative, or lazy-load it."
        },
        rule! {
            id: "layout-thrash",
            category: CATEGORY_RENDER,
            kinds: &[ArtifactKind::LayoutRead],
            severity: |_, h| mobile_escalates(Severity::Med, h),
            confidence: Confidence::Med,
            title: "Forced synchronous layout read",
            changes: EXISTS_AFTER,
            remediation: "Batch DOM reads before writes, or read inside requestAnimationFrame."
        },
        rule! {
            id: "effect-without-deps",
            category: CATEGORY_RENDER,
            kinds: &[ArtifactKind::EffectHook],
            severity: |_, _| Severity::Med,
            confidence: Confidence::Med,
            title: "Effect runs after every render",
            changes: EXISTS_AFTER,
            condition: effect_without_deps,
            remediation: "Pass a dependency array so the effect only reruns when its inputs change."
        },
        rule! {
            id: "image-without-dimensions",
            category: CATEGORY_LOADING,
            kinds: &[ArtifactKind::ImageTag],
            severity: |_, _| Severity::Med,
            confidence: Confidence::Med,
            title: "Image without explicit dimensions causes layout shift",
            changes: EXISTS_AFTER,
            condition: image_missing_dimensions,
            remediation: "Set width and height (or an aspect-ratio box) on the image."
        },
        rule! {
            id: "image-not-lazy",
            category: CATEGORY_LOADING,
            kinds: &[ArtifactKind::ImageTag],
            severity: |_, h| mobile_escalates(Severity::Low, h),
            confidence: Confidence::Low,
            title: "Image is not lazy-loaded",
            changes: EXISTS_AFTER,
            condition: image_not_lazy,
            remediation: "Use loading=\"lazy\" for images below the fold."
        },
        rule! {
            id: "unvirtualized-list",
            category: CATEGORY_RENDER,
            kinds: &[ArtifactKind::ListRender],
            severity: |_, h| mobile_escalates(Severity::Low, h),
            confidence: Confidence::Low,
            title: "List rendered without virtualization",
            changes: EXISTS_AFTER,
            remediation: "Virtualize long lists (react-window, vue-virtual-scroller) or paginate."
        },
        rule! {
            id: "inline-handler",
            category: CATEGORY_RENDER,
            kinds: &[ArtifactKind::InlineHandler],
            severity: |_, h| {
                if h.framework.as_deref() == Some("react") {
                    Severity::Low
                } else {
                    Severity::Nit
                }
            },
            confidence: Confidence::Low,
            title: "Inline closure in props defeats memoization",
            changes: EXISTS_AFTER,
            remediation: "Hoist the handler or wrap it in useCallback when the child is memoized."
        },
    ]
}
