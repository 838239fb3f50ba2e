//! Operator arity table.
//!
//! Only the operators the rewrite passes construct or inspect are listed.
//! Unknown operators are accepted without arity checks.

/// ONNX default domain.
pub const DOMAIN_ONNX: &str = "";
/// Domain of the quantization and fused custom ops.
pub const DOMAIN_GRAFT: &str = "com.graft";

pub const FLOAT2FIX: &str = "float2fix";
pub const FIX2FLOAT: &str = "fix2float";
pub const FIX: &str = "fix";
pub const FUSED_SUBGRAPH: &str = "FusedSubgraph";

/// Attribute carrying the quantization precision of the `com.graft` ops.
pub const FIX_POINT_ATTR: &str = "fix_point";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSchema {
    pub domain: &'static str,
    pub op_type: &'static str,
    pub min_inputs: usize,
    pub max_inputs: usize,
    /// Output 0 has the element type and shape of input 0.
    pub preserves_type: bool,
}

const fn schema(domain: &'static str, op_type: &'static str, min: usize, max: usize, preserves: bool) -> OpSchema {
    OpSchema { domain, op_type, min_inputs: min, max_inputs: max, preserves_type: preserves }
}

#[rustfmt::skip]
static SCHEMAS: &[OpSchema] = &[
    schema(DOMAIN_ONNX, "Identity",         1, 1, true),
    schema(DOMAIN_ONNX, "Relu",             1, 1, true),
    schema(DOMAIN_ONNX, "Sigmoid",          1, 1, true),
    schema(DOMAIN_ONNX, "Tanh",             1, 1, true),
    schema(DOMAIN_ONNX, "Neg",              1, 1, true),
    schema(DOMAIN_ONNX, "Abs",              1, 1, true),
    schema(DOMAIN_ONNX, "Add",              2, 2, false),
    schema(DOMAIN_ONNX, "Sub",              2, 2, false),
    schema(DOMAIN_ONNX, "Mul",              2, 2, false),
    schema(DOMAIN_ONNX, "Div",              2, 2, false),
    schema(DOMAIN_ONNX, "MatMul",           2, 2, false),
    schema(DOMAIN_ONNX, "Gemm",             2, 3, false),
    schema(DOMAIN_ONNX, "Conv",             2, 3, false),
    schema(DOMAIN_ONNX, "Concat",           1, usize::MAX, false),
    schema(DOMAIN_ONNX, "Transpose",        1, 1, false),
    schema(DOMAIN_ONNX, "Reshape",          2, 2, false),
    schema(DOMAIN_ONNX, "Constant",         0, 0, false),
    schema(DOMAIN_ONNX, "QuantizeLinear",   2, 3, false),
    schema(DOMAIN_ONNX, "DequantizeLinear", 2, 3, false),
    schema(DOMAIN_ONNX, "LSTM",             3, 8, false),
    schema(DOMAIN_GRAFT, FLOAT2FIX,         1, 1, true),
    schema(DOMAIN_GRAFT, FIX2FLOAT,         1, 1, true),
    schema(DOMAIN_GRAFT, FIX,               1, 1, true),
    schema(DOMAIN_GRAFT, FUSED_SUBGRAPH,    0, usize::MAX, false),
];

pub fn lookup(domain: &str, op_type: &str) -> Option<&'static OpSchema> {
    SCHEMAS.iter().find(|s| s.domain == domain && s.op_type == op_type)
}
