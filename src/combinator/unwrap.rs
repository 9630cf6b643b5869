//! Flattening of operations whose result is another operation

use crate::client::AsyncOpClient;
use crate::op::AsyncOpResult;


impl<T: AsyncOpResult + Clone> AsyncOpClient<AsyncOpClient<T>> {
    /// Build an operation which completes when the inner operation does
    ///
    /// If the outer operation faults or is canceled before producing an
    /// inner operation, that outcome propagates directly.
    ///
    pub fn unwrap_nested(&self) -> AsyncOpClient<T> {
        self.then(|inner| Ok(inner.clone()))
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::client::AsyncOpClient;
    use crate::error::OpError;
    use crate::op::AsyncOp;

    /// Check that the inner outcome is what matters on success
    #[test]
    fn inner_outcome() {
        let (outer_server, outer) = AsyncOp::<AsyncOpClient<u32>>::new().split();
        let (inner_server, inner) = AsyncOp::<u32>::new().split();
        let flat = outer.unwrap_nested();
        outer_server.set_result(inner).unwrap();
        assert!(!flat.is_completed());
        inner_server.set_result(9).unwrap();
        assert_eq!(*flat.result().unwrap(), 9);

        let error = OpError::msg("inner failure");
        let outer = AsyncOpClient::from_result(
            AsyncOpClient::<u32>::from_error(error.clone())
        );
        assert_eq!(outer.unwrap_nested().exception(), Some(error));
    }

    /// Check that outer failures propagate directly
    #[test]
    fn outer_outcome() {
        let error = OpError::msg("outer failure");
        let outer = AsyncOpClient::<AsyncOpClient<u32>>::from_error(error.clone());
        assert_eq!(outer.unwrap_nested().exception(), Some(error));

        let outer = AsyncOpClient::<AsyncOpClient<u32>>::canceled();
        assert!(outer.unwrap_nested().is_canceled());
    }
}
