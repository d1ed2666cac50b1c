use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use tflite_trace::{
    DataType, Error, GraphDescription, Interpreter, ReadError, Result, TensorData, TensorDetails,
    TensorRead, TensorValue, TensorValues, TraceBuilder, TraceOptions, build_trace, decode_trace,
    encode_trace, trace,
};

/// Interpreter double that serves preset tensor values
#[derive(Default)]
struct FakeInterpreter {
    inputs: Vec<TensorDetails>,
    values: HashMap<usize, TensorData>,
    failing: HashSet<usize>,
    fail_invoke: bool,
    calls: Vec<&'static str>,
    received: Option<(usize, TensorValue)>,
}

impl FakeInterpreter {
    fn with_input(dtype: DataType, shape: Vec<usize>) -> Self {
        FakeInterpreter {
            inputs: vec![TensorDetails {
                name: "in0".to_string(),
                index: 0,
                dtype,
                shape,
            }],
            ..Default::default()
        }
    }

    fn value(mut self, index: usize, data: TensorData) -> Self {
        self.values.insert(index, data);
        self
    }
}

impl Interpreter for FakeInterpreter {
    fn allocate_tensors(&mut self) -> Result<()> {
        self.calls.push("allocate");
        Ok(())
    }

    fn input_details(&self) -> Vec<TensorDetails> {
        self.inputs.clone()
    }

    fn set_tensor(&mut self, index: usize, value: TensorValue) -> Result<()> {
        self.calls.push("set");
        let slot = self
            .inputs
            .iter()
            .find(|d| d.index == index)
            .ok_or_else(|| Error::Interpreter(format!("no input {}", index)))?;
        if slot.shape != value.shape {
            return Err(Error::Interpreter(format!(
                "shape mismatch: expected {:?}, got {:?}",
                slot.shape, value.shape
            )));
        }
        self.received = Some((index, value));
        Ok(())
    }

    fn invoke(&mut self) -> Result<()> {
        self.calls.push("invoke");
        if self.fail_invoke {
            return Err(Error::Interpreter("invoke failed".to_string()));
        }
        Ok(())
    }

    fn get_tensor(&self, index: usize) -> TensorRead {
        if self.failing.contains(&index) {
            return Err(ReadError::Backend(format!("tensor {} not resolvable", index)));
        }
        self.values
            .get(&index)
            .cloned()
            .ok_or(ReadError::NotAllocated(index))
    }
}

const RELU_MODEL: &str = r#"{
    "operator_codes": [{"builtin_code": "RELU"}],
    "subgraphs": [{
        "tensors": [{"name": "in0", "shape": [1, 4]}, {"name": "out0", "shape": [1, 2]}],
        "operators": [{"opcode_index": 0, "inputs": [0], "outputs": [1]}]
    }]
}"#;

const MIXED_MODEL: &str = r#"{
    "operator_codes": [{"builtin_code": "CONV_2D"}, {"builtin_code": "SPLIT"}],
    "subgraphs": [{
        "tensors": [
            {"name": "input", "type": "INT8", "shape": [1, 2],
             "quantization": {"scale": [0.5], "zero_point": [-1]}},
            {"type": "INT8", "shape": [2, 2]},
            {"name": "bias", "type": "INT32", "shape": [2]},
            {"name": "conv", "type": "INT8", "shape": [1, 2], "quantization": {}},
            {"name": "split", "type": "INT8", "shape": [1, 1]}
        ],
        "operators": [
            {"opcode_index": 0, "inputs": [0, -1, 1, 2], "outputs": [3]},
            {"opcode_index": 1, "inputs": [3], "outputs": [4, 4]}
        ]
    }]
}"#;

fn sample(shape: Vec<usize>, values: Vec<i8>) -> TensorValue {
    TensorValue::new(shape, TensorData::Int8(values)).expect("valid sample")
}

#[test]
fn relu_scenario() {
    let graph = GraphDescription::load_from_str(RELU_MODEL).expect("model should load");
    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1, 4])
        .value(0, TensorData::Int8(vec![1, 2, 3, 4]))
        .value(1, TensorData::Int8(vec![5, 6]));

    let trace = build_trace(&mut interpreter, &graph, &sample(vec![1, 4], vec![1, 2, 3, 4]))
        .expect("trace should build");

    assert_eq!(trace.len(), 1);
    let record = &trace[0];
    assert_eq!(record.op_index, 0);
    assert_eq!(record.op_type, "RELU");

    assert_eq!(record.inputs.len(), 1);
    assert_eq!(record.inputs[0].index, 0);
    assert_eq!(record.inputs[0].name, "in0");
    assert_eq!(
        record.inputs[0].values,
        TensorValues::Available(TensorData::Int8(vec![1, 2, 3, 4]))
    );

    assert_eq!(record.outputs.len(), 1);
    assert_eq!(record.outputs[0].index, 1);
    assert_eq!(
        record.outputs[0].values,
        TensorValues::Available(TensorData::Int8(vec![5, 6]))
    );

    // no declared type in the document
    assert_eq!(record.inputs[0].dtype, DataType::Unknown);
    assert_eq!(interpreter.calls, vec!["allocate", "set", "invoke"]);
}

#[test]
fn optional_inputs_defaults_and_duplicates() {
    let graph = GraphDescription::load_from_str(MIXED_MODEL).expect("model should load");
    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1, 2])
        .value(0, TensorData::Int8(vec![3, 4]))
        .value(1, TensorData::Int8(vec![1, 0, 0, 1]))
        .value(2, TensorData::Int32(vec![10, -10]))
        .value(3, TensorData::Int8(vec![7, -7]))
        .value(4, TensorData::Int8(vec![7]));

    let trace = build_trace(&mut interpreter, &graph, &sample(vec![1, 2], vec![3, 4]))
        .expect("trace should build");
    assert_eq!(trace.len(), 2);

    let conv = &trace[0];
    assert_eq!(conv.op_type, "CONV_2D");
    let input_indices: Vec<usize> = conv.inputs.iter().map(|s| s.index).collect();
    assert_eq!(input_indices, vec![0, 1, 2], "-1 slot must be dropped, order kept");

    assert_eq!(conv.inputs[0].quantization.scale, vec![0.5]);
    assert_eq!(conv.inputs[0].quantization.zero_point, vec![-1]);
    assert_eq!(conv.inputs[1].name, "tensor_1");
    assert!(conv.inputs[1].quantization.scale.is_empty());
    assert!(conv.inputs[1].quantization.zero_point.is_empty());
    assert_eq!(conv.inputs[2].dtype, DataType::Int32);
    assert!(conv.outputs[0].quantization.scale.is_empty());

    let split = &trace[1];
    let output_indices: Vec<usize> = split.outputs.iter().map(|s| s.index).collect();
    assert_eq!(output_indices, vec![4, 4], "duplicate outputs must be kept");
}

#[test]
fn failed_read_degrades_only_that_snapshot() {
    let graph = GraphDescription::load_from_str(MIXED_MODEL).expect("model should load");
    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1, 2])
        .value(0, TensorData::Int8(vec![3, 4]))
        .value(1, TensorData::Int8(vec![1, 0, 0, 1]))
        .value(2, TensorData::Int32(vec![10, -10]))
        .value(3, TensorData::Int8(vec![7, -7]));
    interpreter.failing.insert(3);
    // tensor 4 was never materialised

    let trace = build_trace(&mut interpreter, &graph, &sample(vec![1, 2], vec![3, 4]))
        .expect("read failures must not abort the trace");

    let conv = &trace[0];
    assert_eq!(conv.outputs[0].index, 3);
    assert_eq!(conv.outputs[0].values, TensorValues::Unavailable);
    assert!(conv.inputs.iter().all(|s| s.values.is_available()));
    assert_eq!(conv.unavailable_count(), 1);

    let split = &trace[1];
    assert_eq!(split.inputs[0].values, TensorValues::Unavailable);
    assert_eq!(split.unavailable_count(), 3);
}

#[test]
fn sample_is_cast_to_declared_input_type() {
    let graph = GraphDescription::load_from_str(RELU_MODEL).expect("model should load");
    let mut interpreter = FakeInterpreter::with_input(DataType::Uint8, vec![1, 4]);
    let input = TensorValue::new(vec![1, 4], TensorData::Float32(vec![1.7, 2.0, 255.0, 0.2]))
        .expect("valid sample");

    build_trace(&mut interpreter, &graph, &input).expect("trace should build");

    let (index, received) = interpreter.received.expect("input should be written");
    assert_eq!(index, 0);
    assert_eq!(received.data, TensorData::Uint8(vec![1, 2, 255, 0]));
}

#[test]
fn structural_failures_propagate() {
    let graph = GraphDescription::load_from_str(RELU_MODEL).expect("model should load");

    let mut wrong_shape = FakeInterpreter::with_input(DataType::Int8, vec![1, 4]);
    let result = build_trace(&mut wrong_shape, &graph, &sample(vec![2, 2], vec![1, 2, 3, 4]));
    assert!(matches!(result, Err(Error::Interpreter(_))));
    assert!(!wrong_shape.calls.contains(&"invoke"));

    let mut broken = FakeInterpreter::with_input(DataType::Int8, vec![1, 4]);
    broken.fail_invoke = true;
    let result = build_trace(&mut broken, &graph, &sample(vec![1, 4], vec![1, 2, 3, 4]));
    assert!(matches!(result, Err(Error::Interpreter(_))));

    let mut no_inputs = FakeInterpreter::default();
    let result = build_trace(&mut no_inputs, &graph, &sample(vec![1, 4], vec![1, 2, 3, 4]));
    assert!(result.is_err(), "missing input slot must fail");
}

#[test]
fn options_select_subgraph_and_slot() {
    let graph = GraphDescription::load_from_str(RELU_MODEL).expect("model should load");

    let builder = TraceBuilder::new(TraceOptions {
        subgraph: 1,
        input_slot: 0,
    });
    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1, 4]);
    let result = builder.build(&mut interpreter, &graph, &sample(vec![1, 4], vec![0; 4]));
    assert!(matches!(result, Err(Error::InvalidModel(_))));
    assert!(interpreter.calls.is_empty(), "bad subgraph is caught before running");

    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1, 4]);
    interpreter.inputs.push(TensorDetails {
        name: "aux".to_string(),
        index: 1,
        dtype: DataType::Int8,
        shape: vec![2],
    });
    let builder = TraceBuilder::new(TraceOptions {
        subgraph: 0,
        input_slot: 1,
    });
    builder
        .build(&mut interpreter, &graph, &sample(vec![2], vec![9, 9]))
        .expect("second slot should accept the sample");
    assert_eq!(interpreter.received.map(|(idx, _)| idx), Some(1));
}

#[test]
fn model_loads_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("model.json");
    std::fs::write(&path, MIXED_MODEL).expect("write model");

    let graph = GraphDescription::load_from_file(&path).expect("model should load");
    assert_eq!(graph.primary_subgraph().tensors.len(), 5);
    assert_eq!(graph.operation_types().unwrap(), vec!["CONV_2D", "SPLIT"]);

    assert!(matches!(
        GraphDescription::load_from_file(dir.path().join("missing.json")),
        Err(Error::Io(_))
    ));
}

#[test]
fn trace_exports_as_json_and_protobuf() {
    let graph = GraphDescription::load_from_str(RELU_MODEL).expect("model should load");
    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1, 4])
        .value(0, TensorData::Int8(vec![1, 2, 3, 4]));

    let records = build_trace(&mut interpreter, &graph, &sample(vec![1, 4], vec![1, 2, 3, 4]))
        .expect("trace should build");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("trace.json");
    trace::write_json(&path, &records).expect("write trace");

    let text = std::fs::read_to_string(&path).expect("read trace");
    let json: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(json[0]["op_type"], "RELU");
    assert_eq!(json[0]["inputs"][0]["values"], serde_json::json!([1, 2, 3, 4]));
    assert_eq!(json[0]["inputs"][0]["dtype"], "UNKNOWN");
    assert_eq!(json[0]["outputs"][0]["values"], "Unavailable");
    assert_eq!(json[0]["outputs"][0]["quantization"]["scale"], serde_json::json!([]));

    let decoded = decode_trace(&encode_trace(&records)).expect("decode trace");
    assert_eq!(decoded, records);
}

#[test]
fn unrecognised_dtypes_are_reported_as_declared() {
    let graph = GraphDescription::load_from_str(
        r#"{
        "operator_codes": [{"builtin_code": "DEQUANTIZE"}],
        "subgraphs": [{
            "tensors": [{"type": "INT2", "shape": [4]}, {"type": 20, "shape": [4]}, {"shape": [4]}],
            "operators": [{"opcode_index": 0, "inputs": [0, 1], "outputs": [2]}]
        }]
    }"#,
    )
    .expect("model should load");
    let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![4]);

    let records = build_trace(&mut interpreter, &graph, &sample(vec![4], vec![0; 4]))
        .expect("trace should build");
    let record = &records[0];
    assert_eq!(record.inputs[0].dtype, DataType::Named("INT2".to_string()));
    assert_eq!(record.inputs[1].dtype, DataType::Code(20));
    assert_eq!(record.outputs[0].dtype, DataType::Unknown);

    let json: serde_json::Value =
        serde_json::from_str(&trace::to_json(&records).expect("render trace")).expect("valid json");
    assert_eq!(json[0]["inputs"][0]["dtype"], "INT2");
    assert_eq!(json[0]["inputs"][1]["dtype"], 20);
    assert_eq!(json[0]["outputs"][0]["dtype"], "UNKNOWN");

    let decoded = decode_trace(&encode_trace(&records)).expect("decode trace");
    assert_eq!(decoded, records);
}

fn chain_model(ops: &[(Vec<i32>, Vec<i32>)], tensor_count: usize) -> GraphDescription {
    let operators: Vec<serde_json::Value> = ops
        .iter()
        .map(|(inputs, outputs)| {
            serde_json::json!({"opcode_index": 0, "inputs": inputs, "outputs": outputs})
        })
        .collect();
    let tensors: Vec<serde_json::Value> = (0..tensor_count)
        .map(|_| serde_json::json!({"type": "INT8", "shape": [1]}))
        .collect();
    GraphDescription::from_value(serde_json::json!({
        "operator_codes": [{"builtin_code": "ADD"}],
        "subgraphs": [{"tensors": tensors, "operators": operators}]
    }))
    .expect("generated model should be valid")
}

proptest! {
    #[test]
    fn records_mirror_operator_declarations(
        ops in prop::collection::vec(
            (
                prop::collection::vec(-1i32..6, 0..5),
                prop::collection::vec(0i32..6, 0..4),
            ),
            0..8,
        )
    ) {
        let graph = chain_model(&ops, 6);
        let mut interpreter = FakeInterpreter::with_input(DataType::Int8, vec![1])
            .value(0, TensorData::Int8(vec![0]))
            .value(2, TensorData::Int8(vec![2]));

        let trace = build_trace(&mut interpreter, &graph, &sample(vec![1], vec![0])).unwrap();
        prop_assert_eq!(trace.len(), ops.len());

        for (record, (inputs, outputs)) in trace.iter().zip(&ops) {
            let expected_inputs: Vec<usize> =
                inputs.iter().filter(|&&i| i != -1).map(|&i| i as usize).collect();
            let expected_outputs: Vec<usize> = outputs.iter().map(|&i| i as usize).collect();
            let got_inputs: Vec<usize> = record.inputs.iter().map(|s| s.index).collect();
            let got_outputs: Vec<usize> = record.outputs.iter().map(|s| s.index).collect();
            prop_assert_eq!(got_inputs, expected_inputs);
            prop_assert_eq!(got_outputs, expected_outputs);

            for snap in record.snapshots() {
                prop_assert_eq!(&snap.name, &format!("tensor_{}", snap.index));
                prop_assert_eq!(snap.values.is_available(), snap.index == 0 || snap.index == 2);
            }
        }
    }
}
