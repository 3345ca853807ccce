//! Graph traversal over expression DAGs

use super::expr::Sx;
use rustc_hash::FxHashSet;

/// All nodes reachable from `roots`, each listed after its operands
///
/// Iterative post-order DFS. Roots are visited in the given order and
/// operands left to right, so the result depends only on graph structure.
pub fn topological_order<'a>(roots: impl IntoIterator<Item = &'a Sx>) -> Vec<Sx> {
    let mut order = Vec::new();
    let mut visited = FxHashSet::default();
    let mut stack: Vec<(Sx, bool)> = Vec::new();

    for root in roots {
        if visited.contains(&root.id()) {
            continue;
        }
        stack.push((root.clone(), false));
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if !visited.insert(node.id()) {
                continue;
            }
            let args: Vec<Sx> = node.args().cloned().collect();
            stack.push((node, true));
            for arg in args.into_iter().rev() {
                if !visited.contains(&arg.id()) {
                    stack.push((arg, false));
                }
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Sx], x: &Sx) -> usize {
        order.iter().position(|n| n.is_same(x)).unwrap()
    }

    #[test]
    fn test_operands_come_first() {
        let a = Sx::symbol("a");
        let b = Sx::symbol("b");
        let ab = &a * &b;
        let f = &ab + &a.sin();
        let order = topological_order([&f]);

        assert_eq!(order.len(), 5);
        assert!(position(&order, &a) < position(&order, &ab));
        assert!(position(&order, &b) < position(&order, &ab));
        assert!(order.last().unwrap().is_same(&f));
    }

    #[test]
    fn test_shared_nodes_listed_once() {
        let a = Sx::symbol("a");
        let s = a.sin();
        let f = &s * &s;
        let g = &s + &f;
        let order = topological_order([&f, &g]);
        assert_eq!(order.len(), 4);
        assert_eq!(order.iter().filter(|n| n.is_same(&s)).count(), 1);
    }

    #[test]
    fn test_order_is_structural() {
        let build = || {
            let x = Sx::symbol("x");
            let y = Sx::symbol("y");
            (&x * &y).exp() - &y
        };
        let first: Vec<String> = topological_order([&build()])
            .iter()
            .map(|n| n.to_string())
            .collect();
        let second: Vec<String> = topological_order([&build()])
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first[0], "x");
    }
}
