//! WGSL sources for the GPU backend.
//!
//! Binding convention: buffer arguments occupy bindings `0..k` in argument order, integer
//! scalars are packed into a storage `array<u32>` at binding `k`, and `f64` scalars into an
//! `array<f64>` at binding `k + 1` when the kernel has any.

pub const HELLO: &str = r#"
@group(0) @binding(0) var<storage, read_write> result: array<u32>;
@group(0) @binding(1) var<storage, read> params: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let n = params[0];
    if (gid.x < n) {
        result[gid.x] = gid.x;
    }
}
"#;

/// Work-group tree sum. Each partial is an `i64` written as little-endian `u32` words.
pub const REDUCE_SUM: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<i32>;
@group(0) @binding(1) var<storage, read_write> partials: array<vec2<u32>>;
@group(0) @binding(2) var<storage, read> params: array<u32>;

// 64-bit two's complement as (lo, hi) words.
var<workgroup> scratch: array<vec2<u32>, 256>;

fn widen(v: i32) -> vec2<u32> {
    return vec2<u32>(bitcast<u32>(v), select(0u, 0xffffffffu, v < 0));
}

fn add64(a: vec2<u32>, b: vec2<u32>) -> vec2<u32> {
    let lo = a.x + b.x;
    let carry = select(0u, 1u, lo < a.x);
    return vec2<u32>(lo, a.y + b.y + carry);
}

@compute @workgroup_size(256)
fn main(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let n = params[0];
    let global_size = groups.x * 256u;

    var acc = vec2<u32>(0u, 0u);
    var i = gid.x;
    while (i < n) {
        acc = add64(acc, widen(input[i]));
        i = i + global_size;
    }
    scratch[lid.x] = acc;
    workgroupBarrier();

    var stride = 128u;
    while (stride > 0u) {
        if (lid.x < stride) {
            scratch[lid.x] = add64(scratch[lid.x], scratch[lid.x + stride]);
        }
        workgroupBarrier();
        stride = stride / 2u;
    }

    if (lid.x == 0u) {
        partials[wid.x] = scratch[0];
    }
}
"#;

pub const DERIVATIVE_X: &str = r#"
@group(0) @binding(0) var<storage, read> input: array<f64>;
@group(0) @binding(1) var<storage, read_write> output: array<f64>;
@group(0) @binding(2) var<storage, read> params: array<u32>;
@group(0) @binding(3) var<storage, read> fparams: array<f64>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let rows = params[0];
    let cols = params[1];
    let dx = fparams[0];
    let row = gid.x;
    if (row >= rows) {
        return;
    }

    let base = row * cols;
    let last = base + cols - 1u;
    output[base] = (input[base + 1u] - input[base]) / dx;
    for (var j = base + 1u; j < last; j = j + 1u) {
        output[j] = (input[j + 1u] - input[j - 1u]) / (2.0 * dx);
    }
    output[last] = (input[last] - input[last - 1u]) / dx;
}
"#;

pub const MATMUL: &str = r#"
@group(0) @binding(0) var<storage, read> a: array<f64>;
@group(0) @binding(1) var<storage, read> b: array<f64>;
@group(0) @binding(2) var<storage, read_write> c: array<f64>;
@group(0) @binding(3) var<storage, read> params: array<u32>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let m = params[0];
    let k = params[1];
    let n = params[2];
    let row = gid.x;
    let col = gid.y;
    if (row >= m || col >= n) {
        return;
    }

    var sum = f64(0.0);
    for (var kk = 0u; kk < k; kk = kk + 1u) {
        sum = sum + a[row * k + kk] * b[kk * n + col];
    }
    c[row * n + col] = sum;
}
"#;
