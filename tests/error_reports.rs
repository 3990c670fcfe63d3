//! Container errors composed with the error reporting crates.
//!
//! - `test_question_mark_into_report`: `?` turns a `ContainerError` into a
//!   `rootcause` report whose context can be recovered
//! - `test_report_context_chain`: container errors as children of
//!   application contexts
//! - `test_thiserror_source`: a `thiserror` enum wrapping `ContainerError`
//! - `test_derive_more_source`: the same with `derive_more`

use core::error::Error as _;

use polybox::{ContainerError, PolyBox, PolyFn};
use rootcause::prelude::*;

fn read_port(config: &PolyBox) -> Result<u16, Report> {
    Ok(*config.get::<u16>()?)
}

#[test]
fn test_question_mark_into_report() {
    assert!(read_port(&PolyBox::new(8080u16)).is_ok_and(|port| port == 8080));

    let report = read_port(&PolyBox::new("8080")).unwrap_err();
    let context = report.downcast_current_context::<ContainerError>();
    assert_eq!(
        context,
        Some(&ContainerError::TypeMismatch {
            expected: "u16",
            found: "&str",
        })
    );

    let report = read_port(&PolyBox::empty()).unwrap_err();
    assert_eq!(
        report.downcast_current_context::<ContainerError>(),
        Some(&ContainerError::Empty { expected: "u16" })
    );
}

#[test]
fn test_report_context_chain() {
    fn notify(callback: &PolyFn<fn(u32) -> bool>) -> Result<bool, Report> {
        let delivered = callback
            .try_call(7)
            .context("delivering notification")
            .attach("subscriber: 7")?;
        Ok(delivered)
    }

    let subscriber: PolyFn<fn(u32) -> bool> = PolyFn::new(|id: u32| id % 2 == 1);
    assert!(notify(&subscriber).is_ok_and(|delivered| delivered));

    let report = notify(&PolyFn::empty()).unwrap_err();
    assert!(
        report
            .downcast_current_context::<ContainerError>()
            .is_none()
    );
    let rendered = report.to_string();
    assert!(rendered.contains("delivering notification"));
    assert!(rendered.contains("called an empty PolyFn"));
}

#[test]
fn test_thiserror_source() {
    #[derive(Debug, thiserror::Error)]
    enum PluginError {
        #[error("plugin state is unusable")]
        State(#[from] ContainerError),
        #[error("plugin {0} is not loaded")]
        #[expect(dead_code, reason = "only the state variant is produced")]
        NotLoaded(String),
    }

    fn ratio(state: &PolyBox) -> Result<f64, PluginError> {
        Ok(*state.get::<f64>()?)
    }

    let err = ratio(&PolyBox::new(1u8)).unwrap_err();
    assert!(matches!(
        err,
        PluginError::State(ContainerError::TypeMismatch { .. })
    ));
    let source = err.source().map(ToString::to_string);
    assert_eq!(
        source.as_deref(),
        Some("type mismatch: expected f64, found u8")
    );

    // A typed report keeps the variant matchable.
    let report: Report<PluginError> = report!(err);
    assert!(matches!(report.current_context(), PluginError::State(_)));
}

#[test]
fn test_derive_more_source() {
    #[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
    enum HandlerError {
        #[display("handler could not be copied")]
        Duplicate(ContainerError),
    }

    fn duplicate(handler: &PolyFn<fn()>) -> Result<PolyFn<fn()>, HandlerError> {
        Ok(handler.try_clone()?)
    }

    let owned = String::from("owned");
    let unique: PolyFn<fn()> = PolyFn::new_move_only(move || assert!(!owned.is_empty()));
    let err = duplicate(&unique).unwrap_err();
    assert_eq!(err.to_string(), "handler could not be copied");
    assert!(
        err.source()
            .is_some_and(|source| source.to_string().ends_with("is not copyable"))
    );

    let shared: PolyFn<fn()> = PolyFn::new(|| {});
    assert!(duplicate(&shared).is_ok());
}
