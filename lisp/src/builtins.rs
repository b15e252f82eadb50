use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use evaluator::{Element, IntervalHandler, RenderFn};

use crate::env::Env;
use crate::error::LispError;
use crate::eval::{Context, apply};
use crate::hiccup;
use crate::value::{BuiltinFn, Value};

/// Define every builtin function in `env`.
pub fn install(env: &Env) {
    let builtins: &[(&'static str, BuiltinFn)] = &[
        // --- arithmetic ---
        ("+", add),
        ("-", subtract),
        ("*", multiply),
        ("/", divide),
        ("mod", modulo),
        ("inc", |args, _| Ok(Value::Number(number_arg("inc", args, 1)? + 1.0))),
        ("dec", |args, _| Ok(Value::Number(number_arg("dec", args, 1)? - 1.0))),
        ("=", |args, _| Ok(Value::Boolean(args.windows(2).all(|w| w[0] == w[1])))),
        ("not=", |args, _| Ok(Value::Boolean(!args.windows(2).all(|w| w[0] == w[1])))),
        ("<", |args, _| compare(args, |a, b| a < b)),
        (">", |args, _| compare(args, |a, b| a > b)),
        ("<=", |args, _| compare(args, |a, b| a <= b)),
        (">=", |args, _| compare(args, |a, b| a >= b)),
        ("not", |args, _| {
            expect_count("not", args, 1)?;
            Ok(Value::Boolean(!args[0].is_truthy()))
        }),
        // --- strings ---
        ("str", |args, _| Ok(Value::String(args.iter().map(|a| a.to_string()).collect()))),
        ("pr-str", |args, _| {
            Ok(Value::String(
                args.iter().map(Value::pr_str).collect::<Vec<_>>().join(" "),
            ))
        }),
        ("println", |args, _| {
            let line: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            log::info!("{}", line.join(" "));
            Ok(Value::Nil)
        }),
        // --- collections ---
        ("list", |args, _| Ok(Value::List(args.to_vec()))),
        ("vector", |args, _| Ok(Value::Vector(args.to_vec()))),
        ("hash-map", hash_map),
        ("get", get),
        ("assoc", assoc),
        ("count", |args, _| {
            expect_count("count", args, 1)?;
            Ok(Value::Number(args[0].items()?.len() as f64))
        }),
        ("first", |args, _| {
            expect_count("first", args, 1)?;
            Ok(args[0].items()?.into_iter().next().unwrap_or(Value::Nil))
        }),
        ("rest", |args, _| {
            expect_count("rest", args, 1)?;
            Ok(Value::List(args[0].items()?.into_iter().skip(1).collect()))
        }),
        ("nth", nth),
        ("conj", conj),
        ("range", range),
        ("map", map),
        ("filter", filter),
        ("reduce", reduce),
        ("apply", apply_builtin),
        // --- atoms ---
        ("atom", |args, _| {
            expect_count("atom", args, 1)?;
            Ok(Value::Atom(Rc::new(RefCell::new(args[0].clone()))))
        }),
        ("deref", |args, _| {
            expect_count("deref", args, 1)?;
            let cell = atom_arg("deref", &args[0])?;
            Ok(cell.borrow().clone())
        }),
        ("reset!", |args, _| {
            expect_count("reset!", args, 2)?;
            let cell = atom_arg("reset!", &args[0])?;
            *cell.borrow_mut() = args[1].clone();
            Ok(args[1].clone())
        }),
        ("swap!", swap),
        ("throw", |args, _| {
            expect_count("throw", args, 1)?;
            Err(LispError::Thrown(args[0].to_string()))
        }),
        // --- host ---
        ("render-text", render_text),
        ("render-html", render_html),
        ("render-unsafe-html", render_unsafe_html),
        ("render-code", render_code),
        ("render-component", render_component),
        ("set-interval", set_interval),
    ];

    for (name, func) in builtins {
        env.set(name, Value::Builtin(*name, *func));
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn expect_count(name: &str, args: &[Value], count: usize) -> Result<(), LispError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(LispError::Arity {
            name: name.to_string(),
            expected: count.to_string(),
            got: args.len(),
        })
    }
}

fn coerce_number(val: &Value) -> Result<f64, LispError> {
    match val {
        Value::Number(n) => Ok(*n),
        other => Err(LispError::TypeError {
            expected: "number".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

fn number_arg(name: &str, args: &[Value], count: usize) -> Result<f64, LispError> {
    expect_count(name, args, count)?;
    coerce_number(&args[0])
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, LispError> {
    args.iter().map(coerce_number).collect()
}

fn atom_arg<'a>(name: &str, val: &'a Value) -> Result<&'a Rc<RefCell<Value>>, LispError> {
    match val {
        Value::Atom(cell) => Ok(cell),
        other => Err(LispError::TypeError {
            expected: format!("an atom for {}", name),
            got: other.type_name().to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn add(args: &[Value], _: &Context) -> Result<Value, LispError> {
    Ok(Value::Number(numbers(args)?.into_iter().sum()))
}

fn multiply(args: &[Value], _: &Context) -> Result<Value, LispError> {
    Ok(Value::Number(numbers(args)?.into_iter().product()))
}

fn subtract(args: &[Value], _: &Context) -> Result<Value, LispError> {
    let nums = numbers(args)?;
    match nums.split_first() {
        None => Err(LispError::Arity {
            name: "-".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        }),
        Some((first, [])) => Ok(Value::Number(-first)),
        Some((first, rest)) => Ok(Value::Number(rest.iter().fold(*first, |acc, n| acc - n))),
    }
}

fn divide(args: &[Value], _: &Context) -> Result<Value, LispError> {
    let nums = numbers(args)?;
    let (first, rest) = match nums.split_first() {
        None => {
            return Err(LispError::Arity {
                name: "/".to_string(),
                expected: "at least 1".to_string(),
                got: 0,
            });
        }
        Some((first, [])) => (1.0, std::slice::from_ref(first)),
        Some((first, rest)) => (*first, rest),
    };
    let mut acc = first;
    for n in rest {
        if *n == 0.0 {
            return Err(LispError::DivisionByZero);
        }
        acc /= n;
    }
    Ok(Value::Number(acc))
}

fn modulo(args: &[Value], _: &Context) -> Result<Value, LispError> {
    expect_count("mod", args, 2)?;
    let a = coerce_number(&args[0])?;
    let b = coerce_number(&args[1])?;
    if b == 0.0 {
        return Err(LispError::DivisionByZero);
    }
    Ok(Value::Number(a.rem_euclid(b)))
}

fn compare(args: &[Value], f: impl Fn(f64, f64) -> bool) -> Result<Value, LispError> {
    let nums = numbers(args)?;
    Ok(Value::Boolean(nums.windows(2).all(|w| f(w[0], w[1]))))
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

fn hash_map(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    let mut with_map = vec![Value::Map(Vec::new())];
    with_map.extend_from_slice(args);
    assoc(&with_map, ctx)
}

fn get(args: &[Value], _: &Context) -> Result<Value, LispError> {
    let (coll, key, default) = match args {
        [coll, key] => (coll, key, Value::Nil),
        [coll, key, default] => (coll, key, default.clone()),
        _ => {
            return Err(LispError::Arity {
                name: "get".to_string(),
                expected: "2 or 3".to_string(),
                got: args.len(),
            });
        }
    };
    let found = match (coll, key) {
        (Value::Map(_), key) => coll.get(key).cloned(),
        (Value::Vector(items), Value::Number(n)) if *n >= 0.0 => items.get(*n as usize).cloned(),
        _ => None,
    };
    Ok(found.unwrap_or(default))
}

fn assoc(args: &[Value], _: &Context) -> Result<Value, LispError> {
    let Some((coll, pairs)) = args.split_first() else {
        return Err(LispError::Arity {
            name: "assoc".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        });
    };
    if pairs.len() % 2 != 0 {
        return Err(LispError::Custom(
            "assoc expects an even number of key/value arguments".to_string(),
        ));
    }
    let mut entries = match coll {
        Value::Map(entries) => entries.clone(),
        Value::Nil => Vec::new(),
        other => {
            return Err(LispError::TypeError {
                expected: "map".to_string(),
                got: other.type_name().to_string(),
            });
        }
    };
    for pair in pairs.chunks(2) {
        match entries.iter_mut().find(|(k, _)| *k == pair[0]) {
            Some(entry) => entry.1 = pair[1].clone(),
            None => entries.push((pair[0].clone(), pair[1].clone())),
        }
    }
    Ok(Value::Map(entries))
}

fn nth(args: &[Value], _: &Context) -> Result<Value, LispError> {
    expect_count("nth", args, 2)?;
    let index = coerce_number(&args[1])?;
    let items = args[0].items()?;
    if index < 0.0 || index as usize >= items.len() {
        return Err(LispError::Custom(format!("index {} out of bounds", index)));
    }
    Ok(items[index as usize].clone())
}

fn conj(args: &[Value], _: &Context) -> Result<Value, LispError> {
    let Some((coll, rest)) = args.split_first() else {
        return Err(LispError::Arity {
            name: "conj".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        });
    };
    match coll {
        Value::Vector(items) => Ok(Value::Vector([items.as_slice(), rest].concat())),
        Value::List(items) => {
            let mut list: Vec<Value> = rest.iter().rev().cloned().collect();
            list.extend(items.iter().cloned());
            Ok(Value::List(list))
        }
        Value::Nil => Ok(Value::List(rest.iter().rev().cloned().collect())),
        other => Err(LispError::TypeError {
            expected: "list or vector".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

fn range(args: &[Value], _: &Context) -> Result<Value, LispError> {
    let nums = numbers(args)?;
    let (start, end, step) = match nums.as_slice() {
        [end] => (0.0, *end, 1.0),
        [start, end] => (*start, *end, 1.0),
        [start, end, step] if *step != 0.0 => (*start, *end, *step),
        _ => {
            return Err(LispError::Arity {
                name: "range".to_string(),
                expected: "1 to 3".to_string(),
                got: args.len(),
            });
        }
    };
    let mut out = Vec::new();
    let mut n = start;
    while (step > 0.0 && n < end) || (step < 0.0 && n > end) {
        out.push(Value::Number(n));
        n += step;
    }
    Ok(Value::List(out))
}

fn map(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("map", args, 2)?;
    let mapped = args[1]
        .items()?
        .into_iter()
        .map(|item| apply(&args[0], vec![item], ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::List(mapped))
}

fn filter(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("filter", args, 2)?;
    let mut kept = Vec::new();
    for item in args[1].items()? {
        if apply(&args[0], vec![item.clone()], ctx)?.is_truthy() {
            kept.push(item);
        }
    }
    Ok(Value::List(kept))
}

fn reduce(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    let (f, init, coll) = match args {
        [f, coll] => {
            let mut items = coll.items()?.into_iter();
            match items.next() {
                Some(first) => (f, first, items.collect::<Vec<_>>()),
                None => return apply(f, Vec::new(), ctx),
            }
        }
        [f, init, coll] => (f, init.clone(), coll.items()?),
        _ => {
            return Err(LispError::Arity {
                name: "reduce".to_string(),
                expected: "2 or 3".to_string(),
                got: args.len(),
            });
        }
    };
    coll.into_iter()
        .try_fold(init, |acc, item| apply(f, vec![acc, item], ctx))
}

fn apply_builtin(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    let Some((f, rest)) = args.split_first() else {
        return Err(LispError::Arity {
            name: "apply".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        });
    };
    let mut call_args: Vec<Value> = Vec::new();
    if let Some((last, middle)) = rest.split_last() {
        call_args.extend(middle.iter().cloned());
        call_args.extend(last.items()?);
    }
    apply(f, call_args, ctx)
}

fn swap(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    let [target, f, extra @ ..] = args else {
        return Err(LispError::Arity {
            name: "swap!".to_string(),
            expected: "at least 2".to_string(),
            got: args.len(),
        });
    };
    let cell = atom_arg("swap!", target)?;
    let current = cell.borrow().clone();
    let mut call_args = vec![current];
    call_args.extend(extra.iter().cloned());
    let updated = apply(f, call_args, ctx)?;
    *cell.borrow_mut() = updated.clone();
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Host capabilities
// ---------------------------------------------------------------------------

fn render_text(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("render-text", args, 1)?;
    let render = ctx
        .callbacks
        .render_text
        .as_ref()
        .ok_or(LispError::Unavailable("render-text"))?;
    render(args[0].to_string());
    Ok(Value::Nil)
}

fn render_html(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("render-html", args, 1)?;
    let render = ctx
        .callbacks
        .render_html
        .as_ref()
        .ok_or(LispError::Unavailable("render-html"))?;
    render(args[0].to_string());
    Ok(Value::Nil)
}

fn render_unsafe_html(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("render-unsafe-html", args, 1)?;
    let render = ctx
        .callbacks
        .render_unsafe_html
        .as_ref()
        .ok_or(LispError::Unavailable("render-unsafe-html"))?;
    render(args[0].to_string());
    Ok(Value::Nil)
}

fn render_code(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("render-code", args, 1)?;
    let render = ctx
        .callbacks
        .render_code
        .as_ref()
        .ok_or(LispError::Unavailable("render-code"))?;
    render(args[0].pr_str());
    Ok(Value::Nil)
}

/// `(render-component view)`: `view` is a hiccup vector, or a function of no
/// arguments returning one that is called on every mount.
fn render_component(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("render-component", args, 1)?;
    let render = ctx
        .callbacks
        .render_component
        .as_ref()
        .ok_or(LispError::Unavailable("render-component"))?;

    let view = args[0].clone();
    if !view.is_callable() {
        hiccup::to_element(&view)?;
    }
    let ctx = ctx.clone();
    let mount: RenderFn = Rc::new(move |el: &Element| {
        let built = if view.is_callable() {
            apply(&view, Vec::new(), &ctx).and_then(|v| hiccup::to_element(&v))
        } else {
            hiccup::to_element(&view)
        };
        match built {
            Ok(child) => el.append_child(child),
            Err(err) => {
                log::warn!("component failed to render: {}", err);
                el.set_text(&format!("ERROR: {}", err));
            }
        }
    });
    render(mount);
    Ok(Value::Nil)
}

/// `(set-interval f ms)`: call `f` every `ms` milliseconds for as long as
/// the evaluating block stays attached. Returns the interval id.
fn set_interval(args: &[Value], ctx: &Context) -> Result<Value, LispError> {
    expect_count("set-interval", args, 2)?;
    let register = ctx
        .callbacks
        .set_interval
        .as_ref()
        .ok_or(LispError::Unavailable("set-interval"))?;
    let millis = coerce_number(&args[1])?;
    if millis < 0.0 {
        return Err(LispError::Custom("interval period must not be negative".to_string()));
    }

    let f = args[0].clone();
    let handler_ctx = ctx.clone();
    let handler: IntervalHandler = Rc::new(move || {
        if let Err(err) = apply(&f, Vec::new(), &handler_ctx) {
            log::warn!("interval handler failed: {}", err);
        }
    });

    let id = register(handler, Duration::from_millis(millis as u64))
        .ok_or(LispError::Unavailable("set-interval"))?;
    Ok(Value::Number(id.0 as f64))
}
