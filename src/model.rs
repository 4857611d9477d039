use std::path::Path;
use std::sync::Mutex;

use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use tracing::debug;

use crate::inference::{Classifier, InferenceError};
use crate::preprocess::FeatureVector;

struct LoadedGraph {
    session: Session,
    graph: Graph,
}

/// A frozen TensorFlow graph with one input and one output operation.
pub struct TfClassifier {
    inner: Mutex<LoadedGraph>,
    input_op: String,
    output_op: String,
}

fn model_err(err: tensorflow::Status) -> InferenceError {
    InferenceError::Model(err.to_string())
}

impl TfClassifier {
    pub fn load(model_path: &Path, input_op: &str, output_op: &str) -> Result<Self, InferenceError> {
        let model_bytes = std::fs::read(model_path)?;

        let mut graph = Graph::new();
        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(model_err)?;

        // Fail at startup, not on the first request, if the graph is not the one expected.
        for name in [input_op, output_op] {
            graph.operation_by_name_required(name).map_err(|_| {
                InferenceError::Model(format!(
                    "operation '{name}' not found in {}",
                    model_path.display()
                ))
            })?;
        }

        let session = Session::new(&SessionOptions::new(), &graph).map_err(model_err)?;
        debug!(path = %model_path.display(), input_op, output_op, "Graph imported");

        Ok(Self {
            inner: Mutex::new(LoadedGraph { session, graph }),
            input_op: input_op.to_string(),
            output_op: output_op.to_string(),
        })
    }
}

impl Classifier for TfClassifier {
    fn predict(&self, input: &FeatureVector) -> Result<Vec<f32>, InferenceError> {
        let loaded = self
            .inner
            .lock()
            .map_err(|_| InferenceError::Model("session lock poisoned".to_string()))?;

        let input_operation = loaded
            .graph
            .operation_by_name_required(&self.input_op)
            .map_err(model_err)?;
        let output_operation = loaded
            .graph
            .operation_by_name_required(&self.output_op)
            .map_err(model_err)?;

        let input_tensor = Tensor::<f32>::new(&input.dims)
            .with_values(&input.data)
            .map_err(model_err)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        loaded.session.run(&mut args).map_err(model_err)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token).map_err(model_err)?;
        Ok(output_tensor.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensorflow::ops;
    use tensorflow::{DataType, Scope};

    /// Frozen graph `x -> Identity`, written to a temp dir.
    fn identity_graph(dir: &Path) -> std::path::PathBuf {
        let mut scope = Scope::new_root_scope();
        let x = ops::Placeholder::new()
            .dtype(DataType::Float)
            .build(&mut scope.with_op_name("x"))
            .unwrap();
        ops::Identity::new()
            .build(x, &mut scope.with_op_name("Identity"))
            .unwrap();

        let graph_def = scope.graph().graph_def().unwrap();
        let path = dir.join("identity.pb");
        std::fs::write(&path, graph_def).unwrap();
        path
    }

    #[test]
    fn test_predict_feeds_and_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let path = identity_graph(dir.path());
        let classifier = TfClassifier::load(&path, "x", "Identity").unwrap();

        let data: Vec<f32> = (0..40).map(|i| i as f32 * 0.5).collect();
        let output = classifier
            .predict(&FeatureVector::new(data.clone(), vec![1, 40]))
            .unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn test_load_rejects_missing_operation() {
        let dir = tempfile::tempdir().unwrap();
        let path = identity_graph(dir.path());

        let err = TfClassifier::load(&path, "x", "logits").err().unwrap();
        assert!(matches!(err, InferenceError::Model(ref msg) if msg.contains("logits")));
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TfClassifier::load(&dir.path().join("absent.pb"), "x", "Identity").is_err());
    }
}
