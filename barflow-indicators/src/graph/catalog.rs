//! Builds graph nodes from declarative descriptions.

use std::str::FromStr;

use barflow_core::PriceField;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{IndicatorError, IndicatorResult};
use crate::graph::node::{CalcNode, CandleNode, Combine, CombineOp, Feed, Selected};
use crate::graph::{CalculatorGraph, GraphBuilder, GraphNode};
use crate::indicators::{
    Atr, BollingerBands, Dema, Ema, Macd, Rsi, SessionVwap, Sma, Smma, Stochastic, Tema, Wma,
};
use crate::rolling::{Highest, Lowest};

/// Kinds understood by [`build_node`].
pub const KINDS: &[&str] = &[
    "sma",
    "ema",
    "smma",
    "wma",
    "dema",
    "tema",
    "highest",
    "lowest",
    "rsi",
    "macd",
    "bollinger",
    "stochastic",
    "atr",
    "vwap",
    "difference",
    "sum",
    "ratio",
];

/// Declarative description of one graph node.
///
/// Scalar calculators read `source` when it is set, otherwise their first
/// input, otherwise the close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique node id.
    pub id: String,
    /// Calculator kind, see [`KINDS`].
    pub kind: String,
    /// Candle component to read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PriceField>,
    /// Ids of the nodes this one reads from, in dependency order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Kind-specific parameters.
    #[serde(default = "empty_params")]
    pub params: toml::Value,
}

impl NodeSpec {
    /// Spec with no inputs and default parameters.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            source: None,
            inputs: Vec::new(),
            params: empty_params(),
        }
    }

    fn feed(&self) -> Feed {
        match self.source {
            Some(field) => Feed::Price(field),
            None if !self.inputs.is_empty() => Feed::Dependency(0),
            None => Feed::Price(PriceField::Close),
        }
    }
}

fn empty_params() -> toml::Value {
    toml::Value::Table(toml::map::Map::new())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PeriodParams {
    period: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MacdParams {
    fast: usize,
    slow: usize,
    signal: usize,
    output: String,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
            output: "macd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BollingerParams {
    period: usize,
    std_multiplier: Decimal,
    output: String,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_multiplier: Decimal::TWO,
            output: "middle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StochasticParams {
    k_period: usize,
    d_period: usize,
    output: String,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            k_period: 14,
            d_period: 3,
            output: "k".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

fn parse<T: DeserializeOwned>(spec: &NodeSpec) -> IndicatorResult<T> {
    spec.params.clone().try_into().map_err(|err: toml::de::Error| {
        IndicatorError::InvalidConfig(format!(
            "failed to parse {} params for node `{}`: {err}",
            spec.kind, spec.id
        ))
    })
}

fn period(spec: &NodeSpec, default: usize) -> IndicatorResult<usize> {
    let params: PeriodParams = parse(spec)?;
    Ok(params.period.unwrap_or(default))
}

/// Combinators read their operands positionally, so the input count is
/// fixed when the graph is built rather than discovered mid-stream.
fn check_arity(spec: &NodeSpec, op: CombineOp) -> IndicatorResult<()> {
    let count = spec.inputs.len();
    let (fits, expected) = match op {
        CombineOp::Difference | CombineOp::Ratio => (count == 2, "exactly 2"),
        CombineOp::Sum => (count >= 1, "at least 1"),
    };
    if fits {
        Ok(())
    } else {
        Err(IndicatorError::InvalidConfig(format!(
            "node `{}` of kind {op} takes {expected} inputs, got {count}",
            spec.id
        )))
    }
}

/// Instantiate the calculator described by `spec`.
pub fn build_node(spec: &NodeSpec) -> IndicatorResult<Box<dyn GraphNode>> {
    let feed = spec.feed();
    let node: Box<dyn GraphNode> = match spec.kind.to_ascii_lowercase().as_str() {
        "sma" => Box::new(CalcNode::new(Sma::<Decimal>::new(period(spec, 10)?)?, feed)),
        "ema" => Box::new(CalcNode::new(Ema::<Decimal>::new(period(spec, 10)?)?, feed)),
        "smma" => Box::new(CalcNode::new(Smma::<Decimal>::new(period(spec, 10)?)?, feed)),
        "wma" => Box::new(CalcNode::new(Wma::<Decimal>::new(period(spec, 10)?)?, feed)),
        "dema" => Box::new(CalcNode::new(Dema::<Decimal>::new(period(spec, 10)?)?, feed)),
        "tema" => Box::new(CalcNode::new(Tema::<Decimal>::new(period(spec, 10)?)?, feed)),
        "highest" => Box::new(CalcNode::new(Highest::new(period(spec, 10)?)?, feed)),
        "lowest" => Box::new(CalcNode::new(Lowest::new(period(spec, 10)?)?, feed)),
        "rsi" => Box::new(CalcNode::new(Rsi::<Decimal>::new(period(spec, 14)?)?, feed)),
        "macd" => {
            let params: MacdParams = parse(spec)?;
            let macd = Macd::<Decimal>::new(params.fast, params.slow, params.signal)?;
            Box::new(CalcNode::new(Selected::new(macd, &params.output)?, feed))
        }
        "bollinger" => {
            let params: BollingerParams = parse(spec)?;
            let bands = BollingerBands::<Decimal>::new(params.period, params.std_multiplier)?;
            Box::new(CalcNode::new(Selected::new(bands, &params.output)?, feed))
        }
        "stochastic" => {
            let params: StochasticParams = parse(spec)?;
            let stochastic = Stochastic::new(params.k_period, params.d_period)?;
            Box::new(CandleNode::new(Selected::new(stochastic, &params.output)?))
        }
        "atr" => Box::new(CandleNode::new(Atr::new(period(spec, 14)?)?)),
        "vwap" => {
            parse::<NoParams>(spec)?;
            Box::new(CandleNode::new(SessionVwap::new()))
        }
        kind @ ("difference" | "sum" | "ratio") => {
            parse::<NoParams>(spec)?;
            let op = CombineOp::from_str(kind)?;
            check_arity(spec, op)?;
            Box::new(Combine::new(op))
        }
        _ => return Err(IndicatorError::UnknownKind(spec.kind.clone())),
    };
    Ok(node)
}

/// Instantiate and wire every node in `specs`.
pub fn build_graph(specs: &[NodeSpec]) -> IndicatorResult<CalculatorGraph> {
    let mut builder = GraphBuilder::new();
    for spec in specs {
        builder.add_boxed(spec.id.clone(), build_node(spec)?)?;
    }
    for spec in specs {
        for input in &spec.inputs {
            builder.add_dependency(&spec.id, input)?;
        }
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParamValue, Parameter};

    fn specs(source: &str) -> Vec<NodeSpec> {
        #[derive(Deserialize)]
        struct Doc {
            nodes: Vec<NodeSpec>,
        }
        toml::from_str::<Doc>(source).unwrap().nodes
    }

    #[test]
    fn every_kind_builds_with_defaults() {
        for kind in KINDS {
            let mut spec = NodeSpec::new("node", *kind);
            if matches!(*kind, "difference" | "sum" | "ratio") {
                spec.inputs = vec!["a".into(), "b".into()];
            }
            assert!(build_node(&spec).is_ok(), "{kind} failed to build");
        }
    }

    #[test]
    fn parses_parameters_and_source() {
        let nodes = specs(
            r#"
            [[nodes]]
            id = "fast"
            kind = "ema"
            source = "high"
            params = { period = 5 }

            [[nodes]]
            id = "bands"
            kind = "bollinger"
            params = { period = 10, std_multiplier = 2.5, output = "upper" }
            "#,
        );
        let fast = build_node(&nodes[0]).unwrap();
        assert_eq!(
            fast.parameters(),
            vec![Parameter::new("period", 5usize), Parameter::new("source", "high")]
        );
        let bands = build_node(&nodes[1]).unwrap();
        assert!(bands
            .parameters()
            .contains(&Parameter::new("output", ParamValue::from("upper"))));
    }

    #[test]
    fn rejects_unknown_kind_and_bad_params() {
        assert_eq!(
            build_node(&NodeSpec::new("x", "ichimoku")).err(),
            Some(IndicatorError::UnknownKind("ichimoku".into()))
        );
        let nodes = specs(
            r#"
            [[nodes]]
            id = "bad"
            kind = "sma"
            params = { lenght = 3 }
            "#,
        );
        assert!(matches!(
            build_node(&nodes[0]),
            Err(IndicatorError::InvalidConfig(_))
        ));
        let zero = specs(
            r#"
            [[nodes]]
            id = "zero"
            kind = "sma"
            params = { period = 0 }
            "#,
        );
        assert!(matches!(
            build_node(&zero[0]),
            Err(IndicatorError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn combinators_check_their_input_count() {
        let nodes = specs(
            r#"
            [[nodes]]
            id = "lonely"
            kind = "difference"
            inputs = ["a"]

            [[nodes]]
            id = "crowded"
            kind = "ratio"
            inputs = ["a", "b", "c"]

            [[nodes]]
            id = "empty"
            kind = "sum"

            [[nodes]]
            id = "total"
            kind = "sum"
            inputs = ["a", "b", "c"]
            "#,
        );
        for spec in &nodes[..3] {
            match build_node(spec) {
                Err(IndicatorError::InvalidConfig(message)) => {
                    assert!(message.contains(&spec.id), "{message}")
                }
                other => panic!("{} built: {:?}", spec.id, other.map(|_| ())),
            }
        }
        assert!(build_node(&nodes[3]).is_ok());
    }

    #[test]
    fn wires_inputs_into_dependencies() {
        let nodes = specs(
            r#"
            [[nodes]]
            id = "spread"
            kind = "difference"
            inputs = ["fast", "slow"]

            [[nodes]]
            id = "fast"
            kind = "ema"
            params = { period = 3 }

            [[nodes]]
            id = "slow"
            kind = "ema"
            params = { period = 8 }
            "#,
        );
        let graph = build_graph(&nodes).unwrap();
        let order = graph.execution_order();
        let position = |id: &str| order.iter().position(|n| *n == id).unwrap();
        assert!(position("fast") < position("spread"));
        assert!(position("slow") < position("spread"));
    }
}
