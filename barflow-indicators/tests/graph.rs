//! Calculator graph behaviour: evaluation order, cycles, dirty propagation
//! and replay against the host history.

use barflow_core::{Candle, CandleSeries, PriceField, SessionRule};
use barflow_indicators::graph::{build_graph, CalcNode, Combine, CombineOp, Feed, NodeSpec};
use barflow_indicators::indicators::{Ema, Sma};
use barflow_indicators::{
    Calculable, CalculatorGraph, IndicatorError, ParamValue, RecomputeState,
};
use barflow_test_utils::{closes, series, timestamp, walk, walk_candles};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn run(graph: &mut CalculatorGraph, source: &CandleSeries) {
    for bar in 0..source.candles().len() {
        graph.step(bar, source).unwrap();
    }
}

fn spec(id: &str, kind: &str, inputs: &[&str], params: &str) -> NodeSpec {
    let mut spec = NodeSpec::new(id, kind);
    spec.inputs = inputs.iter().map(|s| s.to_string()).collect();
    spec.params = toml::from_str(params).unwrap();
    spec
}

fn macd_like() -> Vec<NodeSpec> {
    vec![
        spec("spread", "difference", &["fast", "slow"], ""),
        spec("fast", "ema", &[], "period = 3"),
        spec("slow", "ema", &[], "period = 8"),
        spec("signal", "sma", &["spread"], "period = 4"),
    ]
}

#[test]
fn dependencies_evaluate_before_dependents() {
    let source = series(closes(&walk(4, 60)));
    let mut graph = build_graph(&macd_like()).unwrap();
    run(&mut graph, &source);

    let prices: Vec<Decimal> = source.candles().iter().map(|c| c.close).collect();
    let mut fast = Ema::<Decimal>::new(3).unwrap();
    let mut slow = Ema::<Decimal>::new(8).unwrap();
    let mut signal = Sma::<Decimal>::new(4).unwrap();
    for (bar, price) in prices.iter().enumerate() {
        let spread = fast.step(bar, *price).unwrap() - slow.step(bar, *price).unwrap();
        assert_eq!(graph.value("spread", bar).unwrap(), spread);
        assert_eq!(
            graph.value("signal", bar).unwrap(),
            signal.step(bar, spread).unwrap()
        );
    }
}

#[test]
fn cycles_are_rejected_at_build_time() {
    let nodes = vec![
        spec("a", "sma", &["b"], ""),
        spec("b", "ema", &["a"], ""),
    ];
    assert!(matches!(
        build_graph(&nodes),
        Err(IndicatorError::CyclicDependency { .. })
    ));

    let mut builder = CalculatorGraph::builder();
    builder
        .add_node("self", CalcNode::new(Sma::<Decimal>::new(2).unwrap(), Feed::Dependency(0)))
        .unwrap();
    builder.add_dependency("self", "self").unwrap();
    assert_eq!(
        builder.build().err(),
        Some(IndicatorError::CyclicDependency {
            node: "self".into()
        })
    );
}

#[test]
fn builder_rejects_duplicates_and_unknown_ids() {
    let mut builder = CalculatorGraph::builder();
    builder.add_node("sum", Combine::new(CombineOp::Sum)).unwrap();
    assert_eq!(
        builder.add_node("sum", Combine::new(CombineOp::Sum)),
        Err(IndicatorError::DuplicateNode("sum".into()))
    );
    assert_eq!(
        builder.add_dependency("sum", "missing"),
        Err(IndicatorError::UnknownNode("missing".into()))
    );
}

#[test]
fn ratio_with_zero_denominator_falls_back() {
    // volume / (high - low); the third bar is flat
    let candles = vec![
        barflow_test_utils::candle(0, dec!(10), dec!(12), dec!(10), dec!(11), dec!(8)),
        barflow_test_utils::candle(1, dec!(11), dec!(15), dec!(11), dec!(14), dec!(8)),
        barflow_test_utils::candle(2, dec!(14), dec!(14), dec!(14), dec!(14), dec!(8)),
    ];
    let mut volume = NodeSpec::new("volume", "sma");
    volume.source = Some(PriceField::Volume);
    volume.params = toml::from_str("period = 1").unwrap();
    let mut high = NodeSpec::new("high", "sma");
    high.source = Some(PriceField::High);
    high.params = toml::from_str("period = 1").unwrap();
    let mut low = NodeSpec::new("low", "sma");
    low.source = Some(PriceField::Low);
    low.params = toml::from_str("period = 1").unwrap();
    let nodes = vec![
        volume,
        high,
        low,
        spec("range", "difference", &["high", "low"], ""),
        spec("density", "ratio", &["volume", "range"], ""),
    ];
    let source = series(candles);
    let mut graph = build_graph(&nodes).unwrap();
    run(&mut graph, &source);
    assert_eq!(
        graph.output("density").unwrap().values(),
        vec![dec!(4), dec!(2), dec!(2)]
    );
}

#[test]
fn parameter_change_replays_only_affected_nodes() {
    let source = series(closes(&walk(8, 90)));
    let mut graph = build_graph(&macd_like()).unwrap();
    for bar in 0..60 {
        graph.step(bar, &source).unwrap();
    }

    graph
        .set_parameter("slow", "period", ParamValue::Period(13))
        .unwrap();
    assert_eq!(graph.state(), RecomputeState::Dirty);
    assert!(graph.is_dirty("slow").unwrap());
    assert!(graph.is_dirty("spread").unwrap());
    assert!(graph.is_dirty("signal").unwrap());
    assert!(!graph.is_dirty("fast").unwrap());

    for bar in 60..90 {
        graph.step(bar, &source).unwrap();
    }
    assert_eq!(graph.state(), RecomputeState::Clean);

    let mut nodes = macd_like();
    nodes[2].params = toml::from_str("period = 13").unwrap();
    let mut fresh = build_graph(&nodes).unwrap();
    run(&mut fresh, &source);
    for id in ["fast", "slow", "spread", "signal"] {
        assert_eq!(
            graph.output(id).unwrap(),
            fresh.output(id).unwrap(),
            "node {id} diverged"
        );
    }
}

#[test]
fn rejected_parameter_leaves_graph_clean() {
    let mut graph = build_graph(&macd_like()).unwrap();
    assert!(matches!(
        graph.set_parameter("fast", "period", ParamValue::Period(0)),
        Err(IndicatorError::InvalidParameter { .. })
    ));
    assert!(matches!(
        graph.set_parameter("nope", "period", ParamValue::Period(2)),
        Err(IndicatorError::UnknownNode(_))
    ));
    assert_eq!(graph.state(), RecomputeState::Clean);
}

#[test]
fn recalculate_without_changes_is_idempotent() {
    let source = series(walk_candles(3, 50));
    let mut graph = build_graph(&[
        spec("atr", "atr", &[], "period = 5"),
        spec("stoch", "stochastic", &[], "k_period = 5\nd_period = 3"),
        spec("rsi", "rsi", &[], "period = 7"),
    ])
    .unwrap();
    run(&mut graph, &source);
    let before: Vec<_> = ["atr", "stoch", "rsi"]
        .iter()
        .map(|id| graph.output(id).unwrap().clone())
        .collect();
    graph.recalculate(&source).unwrap();
    for (id, series) in ["atr", "stoch", "rsi"].iter().zip(before) {
        assert_eq!(graph.output(id).unwrap(), &series);
    }
}

#[test]
fn open_bar_revisions_flow_through_the_graph() {
    let prices = walk(6, 30);
    let mut live = CandleSeries::new(SessionRule::Continuous);
    let mut graph = build_graph(&macd_like()).unwrap();
    for (bar, price) in prices.iter().enumerate() {
        live.push(Candle::flat(timestamp(bar), *price + dec!(5), Decimal::ONE));
        graph.step(bar, &live).unwrap();
        live.revise_last(Candle::flat(timestamp(bar), *price, Decimal::ONE))
            .unwrap();
        graph.step(bar, &live).unwrap();
    }

    let mut clean = build_graph(&macd_like()).unwrap();
    run(&mut clean, &series(closes(&prices)));
    assert_eq!(
        graph.output("signal").unwrap(),
        clean.output("signal").unwrap()
    );
}

#[test]
fn step_rejects_gaps_and_missing_candles() {
    let source = series(closes(&walk(1, 3)));
    let mut graph = build_graph(&macd_like()).unwrap();
    assert_eq!(
        graph.step(1, &source),
        Err(IndicatorError::NonSequentialWrite {
            expected: 0,
            got: 1
        })
    );
    graph.step(0, &source).unwrap();
    assert!(graph.step(2, &source).is_err());
    graph.step(1, &source).unwrap();
    graph.step(2, &source).unwrap();
    assert_eq!(
        graph.step(3, &source),
        Err(IndicatorError::OutOfRange { bar: 3, len: 3 })
    );
}

#[test]
fn session_vwap_restarts_each_day() {
    let start = timestamp(0);
    let candles: Vec<Candle> = [(0, dec!(10)), (12, dec!(20)), (24, dec!(40)), (36, dec!(60))]
        .into_iter()
        .map(|(hours, price)| Candle::flat(start + Duration::hours(hours), price, dec!(1)))
        .collect();
    let source = CandleSeries::from_candles(candles, SessionRule::daily());
    let mut graph = build_graph(&[NodeSpec::new("vwap", "vwap")]).unwrap();
    run(&mut graph, &source);
    assert_eq!(
        graph.output("vwap").unwrap().values(),
        vec![dec!(10), dec!(15), dec!(40), dec!(50)]
    );
}
