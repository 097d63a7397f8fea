use std::path::{Path, PathBuf};

use burn::prelude::*;

use crate::burnrl::base::ElemType;

/// Mean and population standard deviation; `(0, 0)` for an empty slice.
pub fn mean_std(values: &[ElemType]) -> (ElemType, ElemType) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as ElemType;
    let mean = values.iter().sum::<ElemType>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<ElemType>() / n;

    (mean, var.sqrt())
}

/// Builds a `[rows.len() / width, width]` tensor from row-major data.
pub fn rows_to_tensor<B: Backend>(rows: &[ElemType], width: usize, device: &B::Device) -> Tensor<B, 2> {
    let batch = rows.len() / width.max(1);
    Tensor::<B, 1>::from_floats(rows, device).reshape([batch, width])
}

/// Copies a 2D tensor back to host memory, one `Vec` per row.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<ElemType>> {
    let [_, width] = tensor.dims();
    let data: Vec<ElemType> = tensor.into_data().iter::<ElemType>().collect();

    data.chunks(width.max(1)).map(<[ElemType]>::to_vec).collect()
}

pub fn argmax(values: &[ElemType]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, ElemType::NEG_INFINITY), |best, (i, v)| {
            if *v > best.1 { (i, *v) } else { best }
        })
        .0
}

/// Creates a fresh, timestamped run directory under `artifact_dir`.
pub fn create_artifact_dir(artifact_dir: &str, prefix: &str) -> std::io::Result<PathBuf> {
    let run = format!("{prefix}-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"));
    let path = Path::new(artifact_dir).join(run);

    std::fs::remove_dir_all(&path).ok();
    std::fs::create_dir_all(&path)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use burn::backend::NdArray;

    use super::*;

    #[test]
    fn mean_std_of_constant_values() {
        let (mean, std) = mean_std(&[2.0, 2.0, 2.0]);
        assert_relative_eq!(mean, 2.0);
        assert_relative_eq!(std, 0.0);
    }

    #[test]
    fn mean_std_matches_population_formula() {
        let (mean, std) = mean_std(&[1.0, 3.0]);
        assert_relative_eq!(mean, 2.0);
        assert_relative_eq!(std, 1.0);
        assert_eq!(mean_std(&[]), (0.0, 0.0));
    }

    #[test]
    fn rows_survive_tensor_conversion() {
        let device = Default::default();
        let rows = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = rows_to_tensor::<NdArray>(&rows, 3, &device);

        assert_eq!(tensor.dims(), [2, 3]);
        assert_eq!(
            tensor_to_rows(tensor),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
        );
    }

    #[test]
    fn argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
    }
}
