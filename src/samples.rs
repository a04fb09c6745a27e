use crate::asm::assemble;
use crate::bytecode::Method;
use crate::table::MethodTable;

// Built-in programs: the arithmetic, factorial, GCD, bubble sort and
// linear search corpus, plus two composite demos.
const SAMPLES_SOURCE: &str = r#"
; 5 + 3 * 2
method calculate(0) locals 0
    push 5
    push 3
    push 2
    mul
    add
    return
end

; iterative n!, slot 1 holds the running product
method factorial(1) locals 2
    push 1
    store 1
loop:
    load 0
    push 1
    cmp_gt
    if_false done
    load 1
    load 0
    mul
    store 1
    load 0
    push 1
    sub
    store 0
    goto loop
done:
    load 1
    return
end

; Euclid: (a, b) -> (b, a % b) until b == 0
method gcd(2) locals 3
loop:
    load 1
    if_false done
    load 0
    load 1
    mod
    store 2
    load 1
    store 0
    load 2
    store 1
    goto loop
done:
    load 0
    return
end

; in-place bubble sort of (array, length)
; slots: 2 = i, 3 = j, 4 = swap temp
method sort(2) locals 5
    push 0
    store 2
outer:
    load 2
    load 1
    push 1
    sub
    cmp_lt
    if_false finished
    push 0
    store 3
inner:
    load 3
    load 1
    push 1
    sub
    load 2
    sub
    cmp_lt
    if_false next_pass
    load 0
    load 3
    array_load
    load 0
    load 3
    push 1
    add
    array_load
    cmp_gt
    if_false no_swap
    load 0
    load 3
    array_load
    store 4
    load 0
    load 3
    load 0
    load 3
    push 1
    add
    array_load
    array_store
    load 0
    load 3
    push 1
    add
    load 4
    array_store
no_swap:
    load 3
    push 1
    add
    store 3
    goto inner
next_pass:
    load 2
    push 1
    add
    store 2
    goto outer
finished:
    return_void
end

; index of key in (array, length, key), or -1
method search(3) locals 4
    push 0
    store 3
loop:
    load 3
    load 1
    cmp_lt
    if_false missing
    load 0
    load 3
    array_load
    load 2
    cmp_eq
    if_true found
    load 3
    push 1
    add
    store 3
    goto loop
found:
    load 3
    return
missing:
    push -1
    return
end

method fib(1) locals 1
    load 0
    push 2
    cmp_lt
    if_false recurse
    load 0
    return
recurse:
    load 0
    push 1
    sub
    invoke fib 1
    load 0
    push 2
    sub
    invoke fib 1
    add
    return
end

; sort [5, 3, 4, 1, 2] then find key in the sorted copy
method sorted_search(1) locals 2
    new_array 5
    store 1
    load 1
    push 0
    push 5
    array_store
    load 1
    push 1
    push 3
    array_store
    load 1
    push 2
    push 4
    array_store
    load 1
    push 3
    push 1
    array_store
    load 1
    push 4
    push 2
    array_store
    load 1
    push 5
    invoke sort 2
    load 1
    push 5
    load 0
    invoke search 3
    return
end
"#;

/// Assembled sample methods, in source order.
pub fn sample_methods() -> Vec<Method> {
    assemble(SAMPLES_SOURCE).expect("invalid sample source")
}

/// Verified table holding every sample method.
pub fn sample_table() -> MethodTable {
    MethodTable::load(sample_methods()).expect("sample methods failed verification")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::vm::{BaseplateVm, run};
    use pretty_assertions::assert_eq;

    #[test]
    fn samples_assemble_and_load() {
        let names: Vec<_> = sample_methods().into_iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            ["calculate", "factorial", "gcd", "sort", "search", "fib", "sorted_search"]
        );
        assert_eq!(sample_table().len(), 7);
    }

    #[test]
    fn calculate_respects_precedence() {
        assert_eq!(run(&sample_table(), "calculate", &[]), Ok(11));
    }

    #[test]
    fn factorial_of_five_and_zero() {
        let table = sample_table();
        assert_eq!(run(&table, "factorial", &[Value::Int(5)]), Ok(120));
        assert_eq!(run(&table, "factorial", &[Value::Int(0)]), Ok(1));
        assert_eq!(run(&table, "factorial", &[Value::Int(12)]), Ok(479_001_600));
    }

    #[test]
    fn gcd_of_48_and_18() {
        let table = sample_table();
        assert_eq!(run(&table, "gcd", &[Value::Int(48), Value::Int(18)]), Ok(6));
        assert_eq!(run(&table, "gcd", &[Value::Int(18), Value::Int(48)]), Ok(6));
        assert_eq!(run(&table, "gcd", &[Value::Int(7), Value::Int(0)]), Ok(7));
    }

    #[test]
    fn sort_is_in_place() {
        let table = sample_table();
        let mut vm = BaseplateVm::new(&table);
        let array = vm.alloc_array(&[5, 3, 4, 1, 2]).unwrap();

        assert_eq!(vm.run("sort", &[array, Value::Int(5)]), Ok(0));
        assert_eq!(vm.array(array), Some(&[1, 2, 3, 4, 5][..]));
        assert_eq!(vm.arrays().len(), 1);
    }

    #[test]
    fn sort_handles_empty_and_single() {
        let table = sample_table();
        let mut vm = BaseplateVm::new(&table);
        let empty = vm.alloc_array(&[]).unwrap();
        let single = vm.alloc_array(&[42]).unwrap();
        assert_eq!(vm.run("sort", &[empty, Value::Int(0)]), Ok(0));
        assert_eq!(vm.run("sort", &[single, Value::Int(1)]), Ok(0));
        assert_eq!(vm.array(single), Some(&[42][..]));
    }

    #[test]
    fn search_finds_index_or_minus_one() {
        let table = sample_table();
        let mut vm = BaseplateVm::new(&table);
        let array = vm.alloc_array(&[5, 3, 4, 1, 2]).unwrap();

        assert_eq!(vm.run("search", &[array, Value::Int(5), Value::Int(9)]), Ok(-1));
        assert_eq!(vm.run("search", &[array, Value::Int(5), Value::Int(4)]), Ok(2));
        assert_eq!(vm.array(array), Some(&[5, 3, 4, 1, 2][..]));
    }

    #[test]
    fn search_past_the_end_faults() {
        let table = sample_table();
        let mut vm = BaseplateVm::new(&table);
        let array = vm.alloc_array(&[1, 2]).unwrap();
        let fault = vm
            .run("search", &[array, Value::Int(3), Value::Int(9)])
            .unwrap_err();
        assert_eq!(fault.kind, crate::fault::FaultKind::IndexOutOfBounds);
        assert_eq!(fault.method, "search");
    }

    #[test]
    fn fib_recurses() {
        let table = sample_table();
        let mut vm = BaseplateVm::new(&table);
        assert_eq!(vm.run("fib", &[Value::Int(10)]), Ok(55));
        assert_eq!(vm.stats().max_depth, 10);
    }

    #[test]
    fn sorted_search_nests_calls() {
        let table = sample_table();
        let mut vm = BaseplateVm::new(&table);
        assert_eq!(vm.run("sorted_search", &[Value::Int(4)]), Ok(3));
        assert_eq!(vm.stats().calls, 2);
        assert_eq!(vm.stats().arrays, 1);
    }
}
