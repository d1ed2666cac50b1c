use prost::Message;

use crate::{
    DataType, QuantizationParams, Result, TensorData, TensorSnapshot, TensorValues, TraceRecord,
};

/// Protobuf wire form of a whole trace
#[derive(Clone, PartialEq, Message)]
pub struct TraceProto {
    #[prost(message, repeated, tag = "1")]
    pub records: Vec<RecordProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RecordProto {
    #[prost(uint64, tag = "1")]
    pub op_index: u64,
    #[prost(string, tag = "2")]
    pub op_type: String,
    #[prost(message, repeated, tag = "3")]
    pub inputs: Vec<SnapshotProto>,
    #[prost(message, repeated, tag = "4")]
    pub outputs: Vec<SnapshotProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SnapshotProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint64, tag = "2")]
    pub index: u64,
    #[prost(string, tag = "3")]
    pub dtype: String,
    #[prost(int32, repeated, tag = "4")]
    pub shape: Vec<i32>,
    #[prost(message, optional, tag = "5")]
    pub quantization: Option<QuantizationProto>,
    /// False when the value could not be read
    #[prost(bool, tag = "6")]
    pub available: bool,
    /// Element type of `values` as read, which may differ from `dtype`
    #[prost(string, tag = "7")]
    pub value_type: String,
    #[prost(double, repeated, tag = "8")]
    pub values: Vec<f64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuantizationProto {
    #[prost(float, repeated, tag = "1")]
    pub scale: Vec<f32>,
    #[prost(int64, repeated, tag = "2")]
    pub zero_point: Vec<i64>,
}

// Translation between crate-native trace types and the prost messages.
// Keep all direct message-field usage here.

/// Encode a trace into protobuf bytes.
///
/// Values travel as doubles, so 64-bit integers above 2^53 lose precision.
pub fn encode_trace(trace: &[TraceRecord]) -> Vec<u8> {
    TraceProto {
        records: trace.iter().map(record_to_proto).collect(),
    }
    .encode_to_vec()
}

/// Decode protobuf bytes produced by [`encode_trace`]
pub fn decode_trace(bytes: &[u8]) -> Result<Vec<TraceRecord>> {
    TraceProto::decode(bytes)?
        .records
        .into_iter()
        .map(record_from_proto)
        .collect()
}

fn record_to_proto(record: &TraceRecord) -> RecordProto {
    RecordProto {
        op_index: record.op_index as u64,
        op_type: record.op_type.clone(),
        inputs: record.inputs.iter().map(snapshot_to_proto).collect(),
        outputs: record.outputs.iter().map(snapshot_to_proto).collect(),
    }
}

fn snapshot_to_proto(snapshot: &TensorSnapshot) -> SnapshotProto {
    let (available, value_type, values) = match snapshot.values.data() {
        Some(data) => (
            true,
            data.data_type().name().into_owned(),
            data.to_f64_vec(),
        ),
        None => (false, String::new(), Vec::new()),
    };

    SnapshotProto {
        name: snapshot.name.clone(),
        index: snapshot.index as u64,
        dtype: snapshot.dtype.name().into_owned(),
        shape: snapshot.shape.clone(),
        quantization: Some(QuantizationProto {
            scale: snapshot.quantization.scale.clone(),
            zero_point: snapshot.quantization.zero_point.clone(),
        }),
        available,
        value_type,
        values,
    }
}

fn record_from_proto(record: RecordProto) -> Result<TraceRecord> {
    Ok(TraceRecord {
        op_index: usize::try_from(record.op_index)?,
        op_type: record.op_type,
        inputs: record
            .inputs
            .into_iter()
            .map(snapshot_from_proto)
            .collect::<Result<_>>()?,
        outputs: record
            .outputs
            .into_iter()
            .map(snapshot_from_proto)
            .collect::<Result<_>>()?,
    })
}

fn snapshot_from_proto(snapshot: SnapshotProto) -> Result<TensorSnapshot> {
    let values = if snapshot.available {
        let value_type = DataType::from_name(&snapshot.value_type);
        TensorValues::Available(TensorData::from_f64_vec(value_type, snapshot.values)?)
    } else {
        TensorValues::Unavailable
    };

    let quantization = snapshot
        .quantization
        .map(|q| QuantizationParams {
            scale: q.scale,
            zero_point: q.zero_point,
        })
        .unwrap_or_default();

    Ok(TensorSnapshot {
        name: snapshot.name,
        index: usize::try_from(snapshot.index)?,
        dtype: DataType::from_label(&snapshot.dtype),
        shape: snapshot.shape,
        quantization,
        values,
    })
}
