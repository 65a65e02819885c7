//! Worklist engine behavior: hash-consing, parse-time rewrites, global
//! analysis limits and the independence of the result from visit order

use seanode_core::prelude::*;

fn int_con(s: &mut Session, v: i64) -> NodeId {
    let t = s.types_mut().make_int(v);
    s.con(t)
}

fn alloc(s: &mut Session, mem: NodeId, fld: &str, val: NodeId) -> (Alloc, NodeId) {
    let ctrl = s.start_ctrl();
    let a = s.new_struct(ctrl, &[(fld, val)]).unwrap();
    let mem = s.mem_merge(mem, &[(a.alias, a.obj)]);
    (a, mem)
}

#[test]
fn test_types_are_interned() {
    let mut ts = TypeStore::new();
    let five = ts.make_int(5);
    let before = ts.len();
    assert_eq!(ts.make_int(5), five);
    let a = ts.make_struct(false, &[("x", five), ("y", Ty::SCALAR)]);
    let b = ts.make_struct(false, &[("x", five), ("y", Ty::SCALAR)]);
    assert_eq!(a, b);
    assert_eq!(ts.len(), before + 1);

    let alias = ts.new_alias().unwrap();
    let s1 = ts.bits_mut().make(BitsKind::Alias, alias);
    let s2 = ts.bits_mut().make(BitsKind::Alias, alias);
    assert_eq!(s1, s2);
    assert_eq!(ts.make_memptr(s1, Ty::USED), ts.make_memptr(s2, Ty::USED));
}

#[test]
fn test_equal_nodes_are_shared() {
    let mut s = Session::new();
    assert_eq!(int_con(&mut s, 9), int_con(&mut s, 9));

    let f = s.new_fun("get", 1, false).unwrap();
    let l1 = s.load(None, f.mem, f.args[0], "x", None);
    let l2 = s.load(None, f.mem, f.args[0], "x", Some(SrcPos::new(4, 1)));
    let l3 = s.load(None, f.mem, f.args[0], "y", None);
    assert_eq!(l1, l2);
    assert_ne!(l1, l3);

    let ret = s.new_ret(f.fun, f.fun, f.mem, l1).unwrap();
    let p1 = s.new_fun_ptr(ret, None).unwrap();
    let p2 = s.new_fun_ptr(ret, None).unwrap();
    assert_eq!(p1, p2);
    s.graph().verify_uses().unwrap();
}

#[test]
fn test_load_forwards_stored_value() {
    let mut s = Session::new();
    let start_mem = s.start_mem();
    let (five, six) = (int_con(&mut s, 5), int_con(&mut s, 6));
    let (a1, mem) = alloc(&mut s, start_mem, "x", five);
    let (_, mem) = alloc(&mut s, mem, "x", six);
    let ctrl = s.start_ctrl();
    // The second store is to an unrelated alias
    let ld = s.load(Some(ctrl), mem, a1.ptr, "x", None);
    assert_eq!(ld, five);
}

#[test]
fn test_non_nil_load_drops_control() {
    let mut s = Session::new();
    let start_mem = s.start_mem();
    let five = int_con(&mut s, 5);
    let (a, mem) = alloc(&mut s, start_mem, "x", five);
    let ctrl = s.start_ctrl();
    let ld = s.load(Some(ctrl), mem, a.ptr, "z", None);
    assert!(matches!(s.graph().kind(ld), NodeKind::Load { .. }));
    assert_eq!(s.node(ld).def(0), None);

    // Nil may still reach: the guard stays
    let nil = s.types().nil();
    let nil = s.con(nil);
    let guarded = s.load(Some(ctrl), mem, nil, "x", None);
    assert_eq!(s.node(guarded).def(0), Some(ctrl));
}

#[test]
fn test_iteration_limit() {
    let config = AnalysisConfig {
        max_iterations: 1,
        ..AnalysisConfig::default()
    };
    let mut s = Session::with_config(config);
    let f = s.new_fun("id", 1, false).unwrap();
    let ret = s.new_ret(f.fun, f.fun, f.mem, f.args[0]).unwrap();
    s.new_fun_ptr(ret, None).unwrap();
    let err = s.gcp().unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::IterationLimit {
            mode: "opto",
            limit: 1
        }
    ));
    assert_eq!(s.worklist_len(), 0);
}

#[test]
fn test_no_return_to_parse_mode() {
    let mut s = Session::new();
    assert!(s.set_parse_mode().is_ok());
    s.gcp().unwrap();
    assert_eq!(s.mode(), Mode::Opto);
    assert!(matches!(
        s.set_parse_mode(),
        Err(AnalysisError::ModeRegression)
    ));
}

#[test]
fn test_wrong_arg_count_leaves_dead_edge() {
    let mut s = Session::new();
    let f = s.new_fun("pair", 2, false).unwrap();
    let ret = s.new_ret(f.fun, f.fun, f.mem, f.args[0]).unwrap();
    let fp = s.new_fun_ptr(ret, None).unwrap();
    let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
    let one = int_con(&mut s, 1);
    let site = s.new_call(ctrl, mem, &[one], fp, Some(SrcPos::new(2, 3)));
    s.keep(site.val);

    let stats = s.gcp().unwrap();
    assert_eq!(stats.wired, 1);
    let callees = s.callees(site.call);
    assert_eq!(callees.len(), 1);
    assert_eq!(callees[0].1, f.fun);
    assert!(!s.edge_live(callees[0].0));
    assert_eq!(s.val(f.fun), Ty::XCTRL);

    let errs = s.errors();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].0, site.call);
    assert_eq!(errs[0].1.kind, ErrKind::ArgCount);
    assert_eq!(
        errs[0].1.msg,
        "Passing 1 arguments to a function which takes 2 arguments"
    );
}

/// `f(x) = x` closing over a fresh struct.
fn closure(s: &mut Session) -> (FunParts, NodeId) {
    let start_mem = s.start_mem();
    let zero = int_con(s, 0);
    let (env, _) = alloc(s, start_mem, "n", zero);
    let f = s.new_fun("f", 1, false).unwrap();
    let ret = s.new_ret(f.fun, f.fun, f.mem, f.args[0]).unwrap();
    let fp = s.new_fun_ptr(ret, Some(env.ptr)).unwrap();
    (f, fp)
}

/// `apply(h, v) = h(v)`
fn apply_fun(s: &mut Session) -> NodeId {
    let f = s.new_fun("apply", 2, false).unwrap();
    let inner = s.new_call(f.fun, f.mem, &[f.args[1]], f.args[0], None);
    let ret = s.new_ret(f.fun, inner.ctrl, inner.mem, inner.val).unwrap();
    s.new_fun_ptr(ret, None).unwrap()
}

#[test]
fn test_unused_display_is_pruned() {
    let mut s = Session::new();
    let (_, fp) = closure(&mut s);
    assert!(s.node(fp).def(1).is_some());
    let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
    let three = int_con(&mut s, 3);
    let site = s.new_call(ctrl, mem, &[three], fp, None);
    s.keep(site.val);

    let stats = s.gcp().unwrap();
    assert!(stats.rewrites >= 1);
    assert_eq!(s.node(fp).def(1), None);
    assert_eq!(s.type_str(site.val), "3");
    s.graph().verify_uses().unwrap();
}

#[test]
fn test_escaping_display_is_kept() {
    let mut s = Session::new();
    let (_, fp) = closure(&mut s);
    let apply = apply_fun(&mut s);
    let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
    let three = int_con(&mut s, 3);
    let site = s.new_call(ctrl, mem, &[fp, three], apply, None);
    s.keep(site.val);

    s.gcp().unwrap();
    assert!(s.node(fp).def(1).is_some());
    assert_eq!(s.type_str(site.val), "3");
}

/// Ids and types of a program with indirect calls and a field read, after
/// global analysis, plus the wired `(call, callee)` pairs.
fn analyze(order: WorklistOrder) -> (Vec<(NodeId, String)>, Vec<(NodeId, NodeId)>) {
    let mut s = Session::with_config(AnalysisConfig::default().with_order(order));
    let (ctrl, start_mem) = (s.start_ctrl(), s.start_mem());

    let id = s.new_fun("id", 1, false).unwrap();
    let ret = s.new_ret(id.fun, id.fun, id.mem, id.args[0]).unwrap();
    let id_fp = s.new_fun_ptr(ret, None).unwrap();

    let five = s.new_fun("five", 1, false).unwrap();
    let k = int_con(&mut s, 5);
    let ret = s.new_ret(five.fun, five.fun, five.mem, k).unwrap();
    let five_fp = s.new_fun_ptr(ret, None).unwrap();

    let get = s.new_fun("get_a", 1, false).unwrap();
    let ld = s.load(None, get.mem, get.args[0], "a", None);
    let ret = s.new_ret(get.fun, get.fun, get.mem, ld).unwrap();
    let get_fp = s.new_fun_ptr(ret, None).unwrap();

    let apply = apply_fun(&mut s);
    let (three, four, seven) = (int_con(&mut s, 3), int_con(&mut s, 4), int_con(&mut s, 7));
    let c1 = s.new_call(ctrl, start_mem, &[id_fp, three], apply, None);
    let c2 = s.new_call(c1.ctrl, c1.mem, &[five_fp, four], apply, None);
    let (obj, mem) = alloc(&mut s, c2.mem, "a", seven);
    let c3 = s.new_call(c2.ctrl, mem, &[obj.ptr], get_fp, None);
    for site in [c1, c2, c3] {
        s.keep(site.val);
    }

    let ids: Vec<NodeId> = s.graph().ids().collect();
    s.gcp().unwrap();
    s.graph().verify_uses().unwrap();

    let mut types = Vec::new();
    let mut wired = Vec::new();
    for n in ids {
        if !s.graph().contains(n) || matches!(s.graph().kind(n), NodeKind::CEProj) {
            continue;
        }
        types.push((n, s.type_str(n)));
        if matches!(s.graph().kind(n), NodeKind::Call { .. }) {
            wired.extend(s.callees(n).into_iter().map(|(_, fun)| (n, fun)));
        }
    }
    wired.sort();
    (types, wired)
}

#[test]
fn test_visit_order_does_not_change_result() {
    let (fifo_types, fifo_wired) = analyze(WorklistOrder::Fifo);
    let (lifo_types, lifo_wired) = analyze(WorklistOrder::Lifo);
    assert_eq!(fifo_types, lifo_types);
    assert_eq!(fifo_wired, lifo_wired);
    // Two outer calls into apply, one into get_a, two callees of the inner call
    assert_eq!(fifo_wired.len(), 5);
}

#[test]
fn test_traced_run_matches_untraced() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("seanode_core=trace"))
        .with_test_writer()
        .try_init();
    let config = AnalysisConfig {
        trace_values: true,
        ..AnalysisConfig::default()
    };
    let mut s = Session::with_config(config);
    let (_, fp) = closure(&mut s);
    let (ctrl, mem) = (s.start_ctrl(), s.start_mem());
    let three = int_con(&mut s, 3);
    let site = s.new_call(ctrl, mem, &[three], fp, None);
    s.keep(site.val);
    s.gcp().unwrap();
    assert!(s.config().trace_values);
    assert_eq!(s.type_str(site.val), "3");
}
