//! jq expressions over exported JSON

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

use super::ExportError;

/// Run `expr` over `input`, collecting every output value
pub fn evaluate(expr: &str, input: Value) -> Result<Vec<Value>, ExportError> {
    let program = File {
        code: expr,
        path: (),
    };
    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();
    let modules = loader
        .load(&arena, program)
        .map_err(|errs| ExportError::Jq(format!("failed to parse {expr:?} ({} errors)", errs.len())))?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errs| ExportError::Jq(format!("failed to compile {expr:?} ({} errors)", errs.len())))?;

    let inputs = RcIter::new(std::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input)));

    let mut values = Vec::new();
    for output in outputs {
        let val = output.map_err(|e| ExportError::Jq(e.to_string()))?;
        values.push(Value::from(val));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_and_map() {
        let input = json!([{"id": 1, "isDraft": true}, {"id": 2, "isDraft": false}]);
        let out = evaluate("map(select(.isDraft)) | .[].id", input).unwrap();
        assert_eq!(out, vec![json!(1)]);
    }

    #[test]
    fn test_std_functions_are_available() {
        let out = evaluate("[.[] | ascii_downcase] | join(\",\")", json!(["A", "B"])).unwrap();
        assert_eq!(out, vec![json!("a,b")]);
    }

    #[test]
    fn test_parse_errors_are_reported() {
        assert!(matches!(evaluate(".[", json!([])), Err(ExportError::Jq(_))));
    }
}
