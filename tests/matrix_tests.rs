//! Matrix arguments through the dispatch layer: aliasing, rejection of
//! incompatible layouts and host reference lifetimes.

use cvbind::bind_test;
use cvbind::prelude::*;

fn context() -> Context {
    let mut ctx = Context::new();
    for module in bind_test::modules() {
        ctx.install(module).expect("Failed to install module");
    }
    ctx.seal().expect("Failed to seal context");
    ctx
}

fn in_out_mat(ctx: &Context, arg: Value) -> Result<Value, ContextError> {
    ctx.call("cv", "bindTest_InOut_Mat", &[arg], &KwArgs::new())
}

#[test]
fn test_in_out_mat_writes_into_host_array() {
    let ctx = context();
    let image = NumArray::zeros(DType::UInt8, &[4, 5, 3]);
    let arg = Value::NumArray(image.clone());

    let ret = in_out_mat(&ctx, arg.clone()).unwrap();
    assert_eq!(ret, arg, "the same array object comes back");

    assert_eq!(image.get::<u8>(&[0, 0, 0]).unwrap(), 100);
    assert_eq!(image.get::<u8>(&[0, 0, 1]).unwrap(), 110);
    assert_eq!(image.get::<u8>(&[0, 0, 2]).unwrap(), 120);
    assert_eq!(image.get::<u8>(&[0, 1, 0]).unwrap(), 0);
}

#[test]
fn test_in_out_mat_accepts_row_stepped_view() {
    let ctx = context();
    let image = NumArray::zeros(DType::UInt8, &[4, 5, 3]);
    let every_other_row = image.step(0, 2).unwrap();

    in_out_mat(&ctx, Value::NumArray(every_other_row.clone())).unwrap();
    assert_eq!(every_other_row.get::<u8>(&[0, 0, 2]).unwrap(), 120);
    assert_eq!(image.get::<u8>(&[0, 0, 2]).unwrap(), 120);
}

#[test]
fn test_in_out_mat_rejects_transposed_array() {
    let ctx = context();
    let image = NumArray::zeros(DType::UInt8, &[4, 5, 3]);
    let err = in_out_mat(&ctx, Value::NumArray(image.transpose())).unwrap_err();

    let ContextError::Native(NativeError::OverloadResolution { attempts, .. }) = err else {
        panic!("expected overload failure, got {err:?}");
    };
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].contains("can't parse 'a'"));
    assert!(attempts[0].contains("not contiguous"));
    assert_eq!(image.to_vec::<u8>().unwrap(), vec![0; 60]);
}

#[test]
fn test_in_out_mat_rejects_unsupported_dtypes() {
    let ctx = context();
    for dtype in [DType::Int64, DType::UInt32, DType::Bool] {
        let array = NumArray::zeros(dtype, &[2, 2, 3]);
        let err = in_out_mat(&ctx, Value::NumArray(array)).unwrap_err();
        assert!(
            matches!(err, ContextError::Native(NativeError::OverloadResolution { .. })),
            "{dtype}: {err:?}"
        );
    }
}

#[test]
fn test_in_out_mat_native_error_on_wrong_element_type() {
    let ctx = context();
    let floats = NumArray::zeros(DType::Float32, &[2, 2, 3]);
    let err = in_out_mat(&ctx, Value::NumArray(floats)).unwrap_err();
    assert!(
        matches!(
            err,
            ContextError::Native(NativeError::Native {
                code: NativeError::BAD_ARG,
                ..
            })
        ),
        "{err:?}"
    );
}

#[test]
fn test_in_out_mat_nil_is_an_empty_matrix() {
    let ctx = context();
    let err = in_out_mat(&ctx, Value::Nil).unwrap_err();
    assert!(matches!(
        err,
        ContextError::Native(NativeError::Native { .. })
    ));
}

#[test]
fn test_host_references_are_released_after_call() {
    let ctx = context();
    let image = NumArray::zeros(DType::UInt8, &[3, 3, 3]);
    assert_eq!(image.ref_count(), 1);

    let arg = Value::NumArray(image.clone());
    let ret = in_out_mat(&ctx, arg).unwrap();
    assert_eq!(image.ref_count(), 2, "only the returned value still refers to it");

    drop(ret);
    assert_eq!(image.ref_count(), 1);
}

#[test]
fn test_decoded_matrix_keeps_array_alive() {
    let image = NumArray::zeros(DType::Float64, &[2, 3]);
    let mat = Mat::from_value(&Value::NumArray(image.clone())).unwrap();
    assert_eq!(image.ref_count(), 2);

    let copy = mat.clone();
    drop(mat);
    assert_eq!(image.ref_count(), 2);
    assert_eq!(copy.refcount(), Some(1));

    drop(copy);
    assert_eq!(image.ref_count(), 1);
}
