//! Test assertions for switcher presentations.

use crate::core::ResolvedMode;
use crate::errors::SwitcherError;
use crate::gate::Presentation;
use crate::switcher::RunSwitcher;
use crate::template::TemplateSource;

/// Asserts that the presentation shows the expected mode.
pub fn assert_mode(presentation: &Presentation, expected: ResolvedMode) {
    assert_eq!(
        presentation.mode(),
        Some(expected),
        "Expected mode {:?}, got {:?}",
        expected,
        presentation
    );
}

/// Asserts that the presentation failed with a run/recurring-run conflict.
pub fn assert_mutual_exclusion(presentation: &Presentation) {
    assert!(
        matches!(presentation.error(), Some(SwitcherError::MutualExclusion(_))),
        "Expected mutual exclusion violation, got {:?}",
        presentation
    );
}

/// Asserts that the editor received a template from the expected source.
pub fn assert_template_source(presentation: &Presentation, expected: TemplateSource) {
    let snapshot = presentation
        .snapshot()
        .unwrap_or_else(|| panic!("Expected an editor, got {:?}", presentation));
    assert_eq!(
        snapshot.template.source(),
        expected,
        "Expected template from {:?}, got {:?}",
        expected,
        snapshot.template.source()
    );
}

/// Asserts that nothing is presented while a required fetch is pending.
pub fn assert_gated(switcher: &RunSwitcher) {
    let pending = switcher.resolver().phases().pending_required();
    if !pending.is_empty() {
        let presentation = switcher.present();
        assert!(
            presentation.is_loading()
                || matches!(presentation.error(), Some(SwitcherError::MutualExclusion(_))),
            "Presented {:?} while {:?} pending",
            presentation,
            pending
        );
    }
}
