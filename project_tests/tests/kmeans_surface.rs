use lib_distclus::abi;
use project_tests::*;
use serde_json::json;

fn kmeans(init: i32) -> i32 {
    let conf = conf(json!({"k": 2, "iter": 20, "seed": SEED}));
    let (code, descr) = create(O_KMEANS, S_REAL, Some(&conf), &make_elements(), init);
    assert_eq!(code, OC_SUCCESS, "create failed with {}", code);
    descr
}

#[test]
fn test_register_is_monotonic() {
    let descr0 = kmeans(I_KMEANSPP);
    let descr1 = kmeans(I_KMEANSPP);
    assert!(descr0 >= 1);
    assert!(descr1 > descr0, "expected greater than {} got {}", descr0, descr1);

    abi::oc_free(descr1);
    let descr2 = kmeans(I_KMEANSPP);
    assert!(descr2 > descr1, "released descriptor {} was reused", descr1);
    abi::oc_free(descr0);
    abi::oc_free(descr2);
}

#[test]
fn test_instances_are_distinct() {
    let descr0 = kmeans(I_KMEANSPP);
    let descr1 = kmeans(I_KMEANSPP);
    push(descr1, &[vec![1.0, 1.0], vec![2.0, 2.0]]);

    assert_eq!(figure(descr0, F_PUSHED_DATA), (OC_SUCCESS, 20.0));
    assert_eq!(figure(descr1, F_PUSHED_DATA), (OC_SUCCESS, 22.0));
    abi::oc_free(descr0);
    abi::oc_free(descr1);
}

#[test]
fn test_predict_separates_the_groups() {
    for init in [I_KMEANSPP, I_GIVEN, I_RANDOM] {
        let descr = kmeans(init);
        assert_eq!(abi::oc_run(descr, 0), OC_SUCCESS);

        let (code, labels) = predict(descr, &make_elements());
        assert_eq!(code, OC_SUCCESS);
        if init != I_RANDOM {
            assert_labels(&labels);
        } else {
            assert_eq!(labels.len(), 20);
        }

        let (code, centers) = centroids(descr);
        assert_eq!(code, OC_SUCCESS);
        if init != I_RANDOM {
            assert_centroids(&centers);
        } else {
            assert_eq!(centers.len(), 2);
        }
        assert_eq!(figure(descr, F_ITERATIONS), (OC_SUCCESS, 20.0));
        abi::oc_free(descr);
    }
}

#[test]
fn test_predict_before_run_is_an_operation_error() {
    let descr = kmeans(I_KMEANSPP);
    let (code, labels) = predict(descr, &make_elements());
    assert_eq!(code, OC_ERR_OPERATION);
    assert!(labels.is_empty());
    let (code, centers) = centroids(descr);
    assert_eq!(code, OC_ERR_OPERATION);
    assert!(centers.is_empty());
    abi::oc_free(descr);
}

#[test]
fn test_unknown_descriptor() {
    let descr = kmeans(I_KMEANSPP);
    abi::oc_free(descr);

    assert_eq!(abi::oc_run(descr, 0), OC_ERR_UNKNOWN_DESCRIPTOR);
    assert_eq!(predict(descr, &make_elements()), (OC_ERR_UNKNOWN_DESCRIPTOR, Vec::new()));
    assert_eq!(centroids(descr), (OC_ERR_UNKNOWN_DESCRIPTOR, Vec::new()));
    assert_eq!(figure(descr, F_ITERATIONS), (OC_ERR_UNKNOWN_DESCRIPTOR, 0.0));
    assert_eq!(set_conf(descr, None), OC_ERR_UNKNOWN_DESCRIPTOR);
    assert_eq!(set_space(descr, S_REAL, None), OC_ERR_UNKNOWN_DESCRIPTOR);

    // void entry points only log
    push(descr, &make_elements());
    abi::oc_close(descr);
    abi::oc_free(descr);
}

#[test]
fn test_close_keeps_results_readable() {
    let descr = kmeans(I_KMEANSPP);
    assert_eq!(abi::oc_run(descr, 0), OC_SUCCESS);
    abi::oc_close(descr);
    abi::oc_close(descr);

    let (code, centers) = centroids(descr);
    assert_eq!(code, OC_SUCCESS);
    assert_centroids(&centers);
    let (code, labels) = predict(descr, &make_elements());
    assert_eq!(code, OC_SUCCESS);
    assert_labels(&labels);

    assert_eq!(abi::oc_run(descr, 0), OC_ERR_OPERATION);
    push(descr, &[vec![0.0, 0.0]]);
    assert_eq!(figure(descr, F_PUSHED_DATA), (OC_SUCCESS, 20.0));
    abi::oc_free(descr);
}

#[test]
fn test_invalid_arguments() {
    let elemts = make_elements();
    for bad in [json!({"k": 0}), json!({"iter": 0}), json!({"bogus": 1}), json!({"k": "two"})] {
        let (code, descr) = create(O_KMEANS, S_REAL, Some(&conf(bad.clone())), &elemts, I_GIVEN);
        assert_eq!(code, OC_ERR_INVALID_ARGUMENT, "{} accepted", bad);
        assert_eq!(descr, 0);
    }
    let not_json = std::ffi::CString::new("{k: 2").unwrap();
    assert_eq!(create(O_KMEANS, S_REAL, Some(&not_json), &elemts, I_GIVEN).0, OC_ERR_INVALID_ARGUMENT);

    assert_eq!(create(42, S_REAL, None, &elemts, I_GIVEN).0, OC_ERR_INVALID_ARGUMENT);
    assert_eq!(create(O_KMEANS, -1, None, &elemts, I_GIVEN).0, OC_ERR_INVALID_ARGUMENT);
    assert_eq!(create(O_KMEANS, S_REAL, None, &elemts, 7).0, OC_ERR_INVALID_ARGUMENT);

    let descr = kmeans(I_KMEANSPP);
    assert_eq!(figure(descr, 99).0, OC_ERR_INVALID_ARGUMENT);
    assert_eq!(set_conf(descr, Some(&conf(json!({"k": 0})))), OC_ERR_INVALID_ARGUMENT);
    abi::oc_free(descr);
}

#[test]
fn test_unsupported_selectors() {
    let elemts = make_elements();
    for kind in [O_MCMC, O_KNN] {
        assert_eq!(create(kind, S_REAL, None, &elemts, I_GIVEN).0, OC_ERR_UNSUPPORTED);
    }
    for space in [S_COMPLEX, S_SERIES] {
        assert_eq!(create(O_KMEANS, space, None, &elemts, I_GIVEN).0, OC_ERR_UNSUPPORTED);
    }
    let descr = kmeans(I_KMEANSPP);
    assert_eq!(set_space(descr, S_SERIES, None), OC_ERR_UNSUPPORTED);
    assert_eq!(set_space(descr, S_REAL, None), OC_SUCCESS);
    abi::oc_free(descr);
}

#[test]
fn test_shape_errors() {
    let descr = kmeans(I_KMEANSPP);
    assert_eq!(abi::oc_run(descr, 0), OC_SUCCESS);

    let mut labels: *mut i64 = std::ptr::null_mut();
    let mut n = 5usize;
    let code = unsafe { abi::oc_predict(descr, std::ptr::null(), 2, 2, &mut labels, &mut n) };
    assert_eq!(code, OC_ERR_SHAPE);
    assert!(labels.is_null());
    assert_eq!(n, 0);

    let code = unsafe { abi::oc_predict(descr, std::ptr::null(), usize::MAX, 3, &mut labels, &mut n) };
    assert_eq!(code, OC_ERR_SHAPE);

    // wrong dimension is the engine's call, and nothing is returned
    let (code, labels) = predict(descr, &[vec![1.0, 2.0, 3.0]]);
    assert_eq!(code, OC_ERR_OPERATION);
    assert!(labels.is_empty());
    abi::oc_free(descr);
}

#[test]
fn test_empty_predict_returns_null_buffer() {
    let descr = kmeans(I_KMEANSPP);
    assert_eq!(abi::oc_run(descr, 0), OC_SUCCESS);
    let (code, labels) = predict(descr, &[]);
    assert_eq!(code, OC_SUCCESS);
    assert!(labels.is_empty());
    abi::oc_free(descr);
}
