use crate::bdd::Bdd;
use crate::reference::Ref;

impl Bdd {
    /// Returns one satisfying path through `node` as signed literals,
    /// ordered by variable.
    ///
    /// For a cube (a conjunction of literals, which is what state conditions
    /// are) the path is exactly the list of its literals.
    /// Returns `None` if `node` is the constant false function.
    pub fn one_sat(&self, node: Ref) -> Option<Vec<i32>> {
        if self.is_zero(node) {
            return None;
        }

        let mut path = Vec::new();
        let mut current = node;

        // Walk down, preferring the high branch whenever it is satisfiable.
        while !self.is_one(current) {
            let var = self.variable(current) as i32;
            let high = self.high_node(current);
            if !self.is_zero(high) {
                path.push(var);
                current = high;
            } else {
                path.push(-var);
                current = self.low_node(current);
            }
        }

        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_sat_cube() {
        let bdd = Bdd::default();

        let f = bdd.cube([1, -2, -3]);
        assert_eq!(bdd.one_sat(f), Some(vec![1, -2, -3]));
    }

    #[test]
    fn test_one_sat_constants() {
        let bdd = Bdd::default();

        assert_eq!(bdd.one_sat(bdd.zero()), None);
        assert_eq!(bdd.one_sat(bdd.one()), Some(vec![]));
    }

    #[test]
    fn test_one_sat_is_a_model() {
        let bdd = Bdd::default();

        let f = -bdd.apply_and(-bdd.cube([-1, 2]), -bdd.cube([3]));
        let path = bdd.one_sat(f).unwrap();
        let model = bdd.cube(path.iter().copied());
        assert_eq!(bdd.apply_and(model, -f), bdd.zero());
    }
}
