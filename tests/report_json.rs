use postfix_calc::{Environment, evaluate_source};
use serde_json::{Value, json};

fn report(source: &str) -> Value {
    let report = evaluate_source(source, &mut Environment::new());
    serde_json::to_value(&report).unwrap()
}

#[test]
fn single_statement() {
    let value = report("a = 5");
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["results"][0]["result"], json!("a = 5"));
    assert_eq!(value["results"][0]["postfix"], json!("a 5 ="));
    assert_eq!(value["results"][0]["line"], json!(1));
    assert_eq!(value["symbol_table"], json!({ "a": 5 }));
    assert_eq!(value["errors"], json!([]));
}

#[test]
fn dependent_statements() {
    let value = report("x = 10\ny = x + 5 * 2\nz = (x + y) * 2 - 10\nresult = z / 5 + x");
    assert_eq!(
        value["symbol_table"],
        json!({ "x": 10, "y": 20, "z": 50, "result": 20.0 })
    );
    assert_eq!(value["results"][3]["result"], json!("result = 20.0"));
}

#[test]
fn errors_are_line_scoped_strings() {
    let value = report("a = 5\nb = undefinedvar + 1\nc = a * 2");
    assert_eq!(
        value["errors"],
        json!(["Line 2: Name Error: Variable `undefinedvar` is not defined."])
    );
    assert_eq!(value["symbol_table"], json!({ "a": 5, "c": 10 }));
    assert_eq!(value["results"].as_array().map(Vec::len), Some(2));
}

#[test]
fn floats_stay_floats() {
    let value = report("h = 1 / 2 / 2\nk = 3 * 1.5");
    assert_eq!(value["symbol_table"], json!({ "h": 0.25, "k": 4.5 }));
    assert!(value["symbol_table"]["h"].is_f64());
}
