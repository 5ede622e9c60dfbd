use rayon::prelude::*;

use super::*;

impl StatsAggregator {
    /// Aggregate a batch of tiles in parallel. Records are
    /// returned in the order of `tiles`.
    ///
    /// This function is only available with the "use-rayon" feature.
    pub fn par_aggregate(&self, tiles: &[(TileId, IndexArrays)]) -> Vec<StatRecord> {
        tiles
            .par_iter()
            .map(|(id, arrays)| self.aggregate(*id, arrays))
            .collect()
    }

    /// Parallel version of
    /// [`aggregate_all`][StatsAggregator::aggregate_all].
    pub fn par_aggregate_all(&self, tiles: &[(TileId, IndexArrays)]) -> StatTable {
        StatTable::new(self.schema.clone(), self.par_aggregate(tiles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use rand::Rng;

    #[test]
    fn test_same_output() {
        let mut rng = rand::thread_rng();
        let indices = vec!["ndvi".to_string(), "gndvi".to_string(), "dsm".to_string()];
        let agg = StatsAggregator::new(indices.clone()).unwrap();

        let tiles: Vec<_> = (0..64)
            .map(|id| {
                let mut arrays = IndexArrays::new();
                for (k, name) in indices.iter().enumerate() {
                    // leave some indices out
                    if (id + k) % 7 == 0 {
                        continue;
                    }
                    let arr = Array::from_shape_fn((9, 11), |_| {
                        if rng.gen_weighted_bool(5) {
                            f64::NAN
                        } else {
                            rng.gen::<f64>()
                        }
                    });
                    arrays.insert(name.clone(), arr.into_dyn());
                }
                (id as TileId, arrays)
            })
            .collect();

        let output1 = agg.aggregate_all(tiles.clone());
        let output2 = agg.par_aggregate_all(&tiles);

        // NaN != NaN: compare bit patterns
        let bits = |t: &StatTable| -> Vec<(TileId, Vec<u64>)> {
            t.records()
                .iter()
                .map(|r| (r.tile_id, r.values.iter().map(|v| v.to_bits()).collect()))
                .collect()
        };
        assert_eq!(bits(&output1), bits(&output2));
    }
}
