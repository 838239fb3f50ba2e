use proptest::prelude::*;

use super::generators::{arb_request, build_dag, pick_names};
use crate::error::FuseError;
use crate::fuse::{fuse, try_fuse};

fn is_sorted(names: &[String]) -> bool {
    names.windows(2).all(|w| w[0] < w[1])
}

proptest! {
    #[test]
    fn accepted_regions_have_sorted_boundaries((steps, inputs, outputs) in arb_request()) {
        let (graph, pool) = build_dag(&steps);
        let inputs = pick_names(&graph, &pool, &inputs);
        let outputs = pick_names(&graph, &pool, &outputs);
        if let Ok(subgraph) = try_fuse(&graph, "region", &inputs, &outputs, Vec::<String>::new(), "prop") {
            let meta = &subgraph.meta_def;
            prop_assert!(is_sorted(&meta.inputs));
            prop_assert!(is_sorted(&meta.outputs));
            prop_assert!(is_sorted(&meta.constant_initializers));
            prop_assert!(subgraph.nodes.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(outputs.iter().all(|o| meta.outputs.contains(o)));
            prop_assert_eq!(meta.device_params.input_types.len(), meta.inputs.len());
        }
    }

    #[test]
    fn accepted_regions_fuse_without_cycles((steps, inputs, outputs) in arb_request()) {
        let (mut graph, pool) = build_dag(&steps);
        let inputs = pick_names(&graph, &pool, &inputs);
        let outputs = pick_names(&graph, &pool, &outputs);
        match try_fuse(&graph, "region", &inputs, &outputs, Vec::<String>::new(), "prop") {
            Ok(subgraph) => {
                let outputs_before = graph.outputs().to_vec();
                fuse(&mut graph, &subgraph).unwrap();
                prop_assert!(graph.try_topological_order().is_ok());
                prop_assert_eq!(graph.outputs(), outputs_before.as_slice());
                graph.gc();
                prop_assert!(graph.resolve().is_ok());
            }
            Err(e) => prop_assert!(
                e.is_loop() || matches!(e, FuseError::OutputOutsideSet { .. }),
                "unexpected rejection: {}", e
            ),
        }
    }
}
