use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Similarity metric declared by a collection.
///
/// Scores are reported raw: inner product and cosine grow with similarity,
/// L2 (squared Euclidean distance) shrinks with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "IP")]
    InnerProduct,
    #[serde(rename = "COSINE")]
    Cosine,
    #[serde(rename = "L2")]
    L2,
}

impl Metric {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InnerProduct => "IP",
            Self::Cosine => "COSINE",
            Self::L2 => "L2",
        }
    }

    /// Raw distance between a query and a stored vector. Both slices must
    /// have the same length.
    pub fn distance(self, query: &[f32], stored: &[f32]) -> f32 {
        match self {
            Self::InnerProduct => dot(query, stored),
            Self::Cosine => {
                let norms = dot(query, query).sqrt() * dot(stored, stored).sqrt();
                if norms == 0.0 {
                    0.0
                } else {
                    dot(query, stored) / norms
                }
            }
            Self::L2 => query
                .iter()
                .zip(stored)
                .map(|(a, b)| (a - b) * (a - b))
                .sum(),
        }
    }

    /// Orders two distances so that the more similar one comes first.
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        match self {
            Self::InnerProduct | Self::Cosine => b.total_cmp(&a),
            Self::L2 => a.total_cmp(&b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IP" => Ok(Self::InnerProduct),
            "COSINE" => Ok(Self::Cosine),
            "L2" => Ok(Self::L2),
            other => anyhow::bail!("unknown metric '{other}' (expected IP, COSINE or L2)"),
        }
    }
}

/// Read-after-write guarantee declared by a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Strong,
    Session,
    Bounded,
    Eventually,
}

impl ConsistencyLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "Strong",
            Self::Session => "Session",
            Self::Bounded => "Bounded",
            Self::Eventually => "Eventually",
        }
    }

    /// Whether writers must wait for inserted records to become visible
    /// before handing the collection to readers.
    pub const fn requires_settle(self) -> bool {
        !matches!(self, Self::Strong)
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "session" => Ok(Self::Session),
            "bounded" => Ok(Self::Bounded),
            "eventually" => Ok(Self::Eventually),
            other => anyhow::bail!("unknown consistency level '{other}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_product_distance() {
        let d = Metric::InnerProduct.distance(&[1.0, 2.0], &[3.0, 4.0]);
        assert!((d - 11.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let d = Metric::Cosine.distance(&[1.0, 1.0], &[2.0, 2.0]);
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        let d = Metric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);
        assert!(d.abs() < f32::EPSILON);
    }

    #[test]
    fn l2_is_squared_euclidean() {
        let d = Metric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rank_orders_by_similarity() {
        assert_eq!(Metric::InnerProduct.rank(0.9, 0.1), Ordering::Less);
        assert_eq!(Metric::Cosine.rank(0.1, 0.9), Ordering::Greater);
        assert_eq!(Metric::L2.rank(0.1, 0.9), Ordering::Less);
    }

    #[test]
    fn parse_metric_and_consistency() {
        assert_eq!("ip".parse::<Metric>().unwrap(), Metric::InnerProduct);
        assert_eq!("COSINE".parse::<Metric>().unwrap(), Metric::Cosine);
        assert!("hamming".parse::<Metric>().is_err());

        assert_eq!(
            "Bounded".parse::<ConsistencyLevel>().unwrap(),
            ConsistencyLevel::Bounded
        );
        assert!("linearizable".parse::<ConsistencyLevel>().is_err());
    }

    #[test]
    fn only_strong_skips_settle() {
        assert!(!ConsistencyLevel::Strong.requires_settle());
        assert!(ConsistencyLevel::Session.requires_settle());
        assert!(ConsistencyLevel::Bounded.requires_settle());
        assert!(ConsistencyLevel::Eventually.requires_settle());
    }
}
