// Copyright (C) 2025 Dayton Fishell
// Baseplate Bytecode Interpreter
// This file is part of Baseplate.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// Runs the built-in sample programs.
use anyhow::Context;
use baseplate_core::asm::assemble;
use baseplate_core::samples::sample_table;
use baseplate_core::{BaseplateVm, MethodTable, Value};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Baseplate Bytecode Interpreter v0.1.0");
    println!("=====================================");
    println!();

    let table = sample_table();
    println!("Loaded {} sample methods:", table.len());
    for (id, method) in table.iter() {
        println!(
            "  {id:>3} {}/{} ({} instructions, {} locals)",
            method.name(),
            method.arity(),
            method.code().len(),
            method.slot_count()
        );
    }
    println!();

    let mut vm = BaseplateVm::new(&table);

    let result = vm.run("calculate", &[])?;
    println!("calculate()        = {result}");

    for n in [0, 5, 10] {
        let result = vm.run("factorial", &[Value::Int(n)])?;
        println!("factorial({n:<2})      = {result}");
    }

    let result = vm.run("gcd", &[Value::Int(48), Value::Int(18)])?;
    println!("gcd(48, 18)        = {result}");

    let result = vm.run("fib", &[Value::Int(15)])?;
    let stats = vm.stats();
    println!(
        "fib(15)            = {result} ({} instructions, {} calls, depth {})",
        stats.instructions, stats.calls, stats.max_depth
    );
    println!();

    let data = [5, 3, 4, 1, 2];
    let array = vm.alloc_array(&data)?;
    println!("array before sort: {:?}", vm.array(array).unwrap_or_default());
    for key in [9, 4] {
        let index = vm.run("search", &[array, Value::Int(5), Value::Int(key)])?;
        println!("search(.., {key})     = {index}");
    }
    vm.run("sort", &[array, Value::Int(5)])?;
    println!("array after sort:  {:?}", vm.array(array).unwrap_or_default());
    let result = vm.run("sorted_search", &[Value::Int(4)])?;
    println!("sorted_search(4)   = {result}");
    println!();

    println!("Faulting program:");
    let broken = MethodTable::load(
        assemble(
            "method broken(1)
                push 100
                load 0
                div
                return
            end",
        )
        .context("assembling fault demo")?,
    )?;
    let mut vm = BaseplateVm::new(&broken);
    match vm.run("broken", &[Value::Int(0)]) {
        Ok(value) => println!("  unexpected result {value}"),
        Err(fault) => println!("  {fault}"),
    }
    println!("  state: {:?}", vm.state());

    Ok(())
}
